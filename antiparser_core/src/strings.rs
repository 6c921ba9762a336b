use crate::error::AntiparserError;
use crate::mutator::INCREMENT_DELTA;
use crate::object::{DataField, MutationMode, ObjectAttrs, sealed};

/// The byte alphabet a string object samples from: every value `0..=255` in
/// ascending order, minus the caller's illegal bytes.
///
/// The permitted range is recomputed eagerly whenever the illegal set changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharSet {
    illegal: Vec<u8>,
    range: Vec<u8>,
}

impl CharSet {
    /// Builds the set of every byte value not listed in `illegal`.
    ///
    /// # Arguments
    /// * `illegal`: Bytes to exclude; duplicates are harmless.
    ///
    /// # Returns
    /// A `CharSet` whose range is ascending and may be empty.
    pub fn excluding(illegal: &[u8]) -> Self {
        let range = (0..=u8::MAX).filter(|b| !illegal.contains(b)).collect();
        Self {
            illegal: illegal.to_vec(),
            range,
        }
    }

    /// The excluded bytes, as given.
    pub fn illegal(&self) -> &[u8] {
        &self.illegal
    }

    /// The permitted bytes in ascending order.
    pub fn range(&self) -> &[u8] {
        &self.range
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }
}

impl Default for CharSet {
    fn default() -> Self {
        Self::excluding(&[])
    }
}

/// Constraints shared by the string-like variants on top of the bound ordering.
fn check_string_attrs(attrs: &ObjectAttrs, charset: &CharSet) -> Result<(), AntiparserError> {
    attrs.check_order()?;
    if attrs.min_size < 0 {
        return Err(AntiparserError::config(format!(
            "string length bounds must be non-negative, got min_size {}",
            attrs.min_size
        )));
    }
    // The incremental ladder probes up to `max_size + delta`.
    if attrs.max_size > i64::MAX - INCREMENT_DELTA {
        return Err(AntiparserError::config(format!(
            "max_size {} leaves no room for the incremental ladder above it",
            attrs.max_size
        )));
    }
    // Incremental mode always asks for at least `delta` bytes.
    if charset.is_empty() && (attrs.max_size > 0 || attrs.mode == MutationMode::Incremental) {
        return Err(AntiparserError::config(
            "illegal characters cover the whole byte alphabet but content must be generated",
        ));
    }
    Ok(())
}

/// A string of arbitrary bytes, optionally followed by a fixed terminator.
///
/// Also serves as the payload of [`crate::DataObject::CString`], which appends
/// a null byte on encode.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FreeformString {
    pub(crate) attrs: ObjectAttrs,
    pub(crate) charset: CharSet,
    pub(crate) terminator: Option<Vec<u8>>,
    pub(crate) content: Vec<u8>,
}

impl FreeformString {
    pub fn new() -> Self {
        Self::default()
    }

    /// A string preset to `content`, typically combined with `set_static(true)`.
    pub fn with_content(content: impl Into<Vec<u8>>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub fn set_content(&mut self, content: impl Into<Vec<u8>>) {
        self.content = content.into();
    }

    pub fn content_size(&self) -> usize {
        self.content.len()
    }

    pub fn illegal_chars(&self) -> &[u8] {
        self.charset.illegal()
    }

    pub fn char_range(&self) -> &[u8] {
        self.charset.range()
    }

    pub(crate) fn charset(&self) -> &CharSet {
        &self.charset
    }

    /// Excludes `chars` from random sampling.
    pub fn set_illegal_chars(&mut self, chars: &[u8]) -> Result<(), AntiparserError> {
        let charset = CharSet::excluding(chars);
        check_string_attrs(&self.attrs, &charset)?;
        self.charset = charset;
        Ok(())
    }

    pub fn terminator(&self) -> Option<&[u8]> {
        self.terminator.as_deref()
    }

    pub fn set_terminator(&mut self, terminator: impl Into<Vec<u8>>) {
        self.terminator = Some(terminator.into());
    }

    pub fn clear_terminator(&mut self) {
        self.terminator = None;
    }
}

impl sealed::Sealed for FreeformString {
    fn attrs_mut(&mut self) -> &mut ObjectAttrs {
        &mut self.attrs
    }
}

impl DataField for FreeformString {
    fn attrs(&self) -> &ObjectAttrs {
        &self.attrs
    }

    fn check_attrs(&self, attrs: &ObjectAttrs) -> Result<(), AntiparserError> {
        check_string_attrs(attrs, &self.charset)
    }
}

/// A string that starts with one keyword drawn from a fixed list, e.g. a
/// protocol verb, followed by a separator and random content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordString {
    pub(crate) attrs: ObjectAttrs,
    pub(crate) keywords: Vec<Vec<u8>>,
    pub(crate) current_keyword: Vec<u8>,
    pub(crate) separator: Vec<u8>,
    pub(crate) charset: CharSet,
    pub(crate) terminator: Option<Vec<u8>>,
    pub(crate) content: Vec<u8>,
}

impl KeywordString {
    /// Creates a keyword string whose current keyword is the first of `keywords`.
    ///
    /// Fails if `keywords` is empty.
    pub fn new<I, K>(keywords: I) -> Result<Self, AntiparserError>
    where
        I: IntoIterator<Item = K>,
        K: Into<Vec<u8>>,
    {
        let keywords = collect_keywords(keywords)?;
        Ok(Self {
            attrs: ObjectAttrs::default(),
            current_keyword: keywords[0].clone(),
            keywords,
            separator: Vec::new(),
            charset: CharSet::default(),
            terminator: None,
            content: Vec::new(),
        })
    }

    pub fn keywords(&self) -> &[Vec<u8>] {
        &self.keywords
    }

    /// Replaces the keyword list and resets the current keyword to its first entry.
    pub fn set_keywords<I, K>(&mut self, keywords: I) -> Result<(), AntiparserError>
    where
        I: IntoIterator<Item = K>,
        K: Into<Vec<u8>>,
    {
        let keywords = collect_keywords(keywords)?;
        self.current_keyword = keywords[0].clone();
        self.keywords = keywords;
        Ok(())
    }

    pub fn current_keyword(&self) -> &[u8] {
        &self.current_keyword
    }

    /// Makes `keyword` the current keyword. It must be one of [`Self::keywords`].
    pub fn set_current_keyword(
        &mut self,
        keyword: impl Into<Vec<u8>>,
    ) -> Result<(), AntiparserError> {
        let keyword = keyword.into();
        if !self.keywords.contains(&keyword) {
            return Err(AntiparserError::config(format!(
                "\"{}\" is not one of the keyword string's keywords",
                keyword.escape_ascii()
            )));
        }
        self.current_keyword = keyword;
        Ok(())
    }

    pub fn separator(&self) -> &[u8] {
        &self.separator
    }

    pub fn set_separator(&mut self, separator: impl Into<Vec<u8>>) {
        self.separator = separator.into();
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub fn set_content(&mut self, content: impl Into<Vec<u8>>) {
        self.content = content.into();
    }

    pub fn content_size(&self) -> usize {
        self.content.len()
    }

    pub fn illegal_chars(&self) -> &[u8] {
        self.charset.illegal()
    }

    pub fn char_range(&self) -> &[u8] {
        self.charset.range()
    }

    pub(crate) fn charset(&self) -> &CharSet {
        &self.charset
    }

    pub fn set_illegal_chars(&mut self, chars: &[u8]) -> Result<(), AntiparserError> {
        let charset = CharSet::excluding(chars);
        check_string_attrs(&self.attrs, &charset)?;
        self.charset = charset;
        Ok(())
    }

    pub fn terminator(&self) -> Option<&[u8]> {
        self.terminator.as_deref()
    }

    pub fn set_terminator(&mut self, terminator: impl Into<Vec<u8>>) {
        self.terminator = Some(terminator.into());
    }

    pub fn clear_terminator(&mut self) {
        self.terminator = None;
    }
}

fn collect_keywords<I, K>(keywords: I) -> Result<Vec<Vec<u8>>, AntiparserError>
where
    I: IntoIterator<Item = K>,
    K: Into<Vec<u8>>,
{
    let keywords: Vec<Vec<u8>> = keywords.into_iter().map(Into::into).collect();
    if keywords.is_empty() {
        return Err(AntiparserError::config(
            "keyword string needs at least one keyword",
        ));
    }
    Ok(keywords)
}

impl sealed::Sealed for KeywordString {
    fn attrs_mut(&mut self) -> &mut ObjectAttrs {
        &mut self.attrs
    }
}

impl DataField for KeywordString {
    fn attrs(&self) -> &ObjectAttrs {
        &self.attrs
    }

    fn check_attrs(&self, attrs: &ObjectAttrs) -> Result<(), AntiparserError> {
        check_string_attrs(attrs, &self.charset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn charset_excludes_illegal_bytes_in_ascending_order() {
        let charset = CharSet::excluding(b"\r\n\x00");
        assert_eq!(charset.range().len(), 253);
        assert!(charset.range().windows(2).all(|w| w[0] < w[1]));
        assert!(!charset.range().contains(&b'\r'));
        assert!(!charset.range().contains(&0));
        assert_eq!(charset.range()[0], 1);
        assert_eq!(charset.illegal(), b"\r\n\x00");
    }

    #[test]
    fn default_charset_is_full_alphabet() {
        let string = FreeformString::new();
        assert_eq!(string.char_range().len(), 256);
        assert!(string.illegal_chars().is_empty());
    }

    #[test]
    fn char_range_is_recomputed_on_assignment() {
        let mut string = FreeformString::new();
        string.set_illegal_chars(b"A").unwrap();
        assert!(!string.char_range().contains(&b'A'));
        string.set_illegal_chars(b"B").unwrap();
        assert!(string.char_range().contains(&b'A'));
        assert!(!string.char_range().contains(&b'B'));
    }

    #[test]
    fn exhausting_the_alphabet_is_rejected_while_content_is_required() {
        let every_byte: Vec<u8> = (0..=u8::MAX).collect();
        let mut string = FreeformString::new();
        assert!(matches!(
            string.set_illegal_chars(&every_byte),
            Err(AntiparserError::Configuration(_))
        ));
        assert_eq!(string.char_range().len(), 256);

        string.set_bounds(0, 0).unwrap();
        string.set_illegal_chars(&every_byte).unwrap();
        assert!(string.char_range().is_empty());
        assert!(string.set_max_size(3).is_err());
        assert!(string.set_mode(MutationMode::Incremental).is_err());
    }

    #[test]
    fn string_bounds_must_be_non_negative() {
        let mut string = FreeformString::new();
        assert!(string.set_bounds(-1, 5).is_err());
    }

    #[test]
    fn string_bounds_must_leave_room_for_the_ladder() {
        let mut string = FreeformString::new();
        assert!(matches!(
            string.set_bounds(0, i64::MAX),
            Err(AntiparserError::Configuration(_))
        ));
        assert_eq!(string.max_size(), 1024);
        string.set_bounds(0, i64::MAX - INCREMENT_DELTA).unwrap();

        let mut keyword = KeywordString::new(["SITE"]).unwrap();
        assert!(keyword.set_max_size(i64::MAX - 1).is_err());
    }

    #[test]
    fn keyword_string_requires_keywords() {
        let empty: Vec<&str> = Vec::new();
        assert!(matches!(
            KeywordString::new(empty.clone()),
            Err(AntiparserError::Configuration(_))
        ));

        let mut keyword = KeywordString::new(["LIST"]).unwrap();
        assert!(keyword.set_keywords(empty).is_err());
        assert_eq!(keyword.keywords(), &[b"LIST".to_vec()]);
    }

    #[test]
    fn set_keywords_resets_current_keyword() {
        let mut keyword = KeywordString::new(["USER", "PASS"]).unwrap();
        keyword.set_current_keyword("PASS").unwrap();
        assert!(keyword.set_current_keyword("RETR").is_err());
        assert_eq!(keyword.current_keyword(), b"PASS");
        keyword.set_keywords(["RETR", "STOR"]).unwrap();
        assert_eq!(keyword.current_keyword(), b"RETR");
    }

    #[test]
    fn terminator_can_be_set_and_cleared() {
        let mut string = FreeformString::with_content("abc");
        assert_eq!(string.terminator(), None);
        string.set_terminator("\r\n");
        assert_eq!(string.terminator(), Some(&b"\r\n"[..]));
        string.clear_terminator();
        assert_eq!(string.terminator(), None);
        assert_eq!(string.content_size(), 3);
    }
}
