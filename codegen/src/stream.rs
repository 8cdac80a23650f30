//! Indentation-aware kernel text builder.

const TAB: &str = "    ";

/// Line-oriented source builder.
///
/// Every line is prefixed with the current indentation. Callers open nested
/// scopes with [`KernelStream::block`], which keeps braces and tabs balanced.
#[derive(Debug, Default, Clone)]
pub struct KernelStream {
    buf: String,
    tab: usize,
}

impl KernelStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn line(&mut self, text: impl AsRef<str>) {
        for _ in 0..self.tab {
            self.buf.push_str(TAB);
        }
        self.buf.push_str(text.as_ref());
        self.buf.push('\n');
    }

    pub fn inc_tab(&mut self) {
        self.tab += 1;
    }

    pub fn dec_tab(&mut self) {
        self.tab = self.tab.saturating_sub(1);
    }

    /// Emit `{`, the indented body, then `}`.
    pub fn block<E>(&mut self, body: impl FnOnce(&mut Self) -> Result<(), E>) -> Result<(), E> {
        self.line("{");
        self.inc_tab();
        let res = body(self);
        self.dec_tab();
        self.line("}");
        res
    }

    /// Infallible [`KernelStream::block`].
    pub fn scope(&mut self, body: impl FnOnce(&mut Self)) {
        self.line("{");
        self.inc_tab();
        body(self);
        self.dec_tab();
        self.line("}");
    }

    pub fn as_str(&self) -> &str {
        &self.buf
    }

    pub fn into_string(self) -> String {
        self.buf
    }
}
