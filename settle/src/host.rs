/// Window that displays the content under test.
///
/// Implemented by the test fixture on top of whatever toolkit the UI uses.
/// Both calls are expected to complete synchronously.
pub trait WindowHost {
    type Content;

    /// Puts `content` into the window and shows it.
    fn show_content(&mut self, content: Self::Content) -> anyhow::Result<()>;

    fn close_window(&mut self) -> anyhow::Result<()>;
}

impl<H: WindowHost + ?Sized> WindowHost for &mut H {
    type Content = H::Content;

    fn show_content(&mut self, content: Self::Content) -> anyhow::Result<()> {
        (**self).show_content(content)
    }

    fn close_window(&mut self) -> anyhow::Result<()> {
        (**self).close_window()
    }
}

impl<H: WindowHost + ?Sized> WindowHost for Box<H> {
    type Content = H::Content;

    fn show_content(&mut self, content: Self::Content) -> anyhow::Result<()> {
        (**self).show_content(content)
    }

    fn close_window(&mut self) -> anyhow::Result<()> {
        (**self).close_window()
    }
}
