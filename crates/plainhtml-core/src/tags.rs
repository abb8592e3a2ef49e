/// Tag-case and empty-element policy for emitted markup.
///
/// HTML 3.2 output uses uppercase tag names; `lower_case_tags` switches to
/// lowercase, and `xhtml` additionally closes empty elements with `/>`.
#[derive(Clone, Copy, Debug)]
pub(crate) struct TagStyle {
    pub lower: bool,
    pub xhtml: bool,
}

impl TagStyle {
    pub fn new(lower: bool, xhtml: bool) -> Self {
        Self {
            lower: lower || xhtml,
            xhtml,
        }
    }

    /// Case-adjusted bare name, for tag and attribute names alike.
    pub fn name(&self, name: &str) -> String {
        if self.lower {
            name.to_ascii_lowercase()
        } else {
            name.to_ascii_uppercase()
        }
    }

    pub fn open(&self, name: &str) -> String {
        format!("<{}>", self.name(name))
    }

    pub fn close(&self, name: &str) -> String {
        format!("</{}>", self.name(name))
    }

    /// `<HR>` in HTML mode, `<hr/>` in XHTML mode.
    pub fn empty(&self, name: &str) -> String {
        if self.xhtml {
            format!("<{}/>", self.name(name))
        } else {
            format!("<{}>", self.name(name))
        }
    }
}
