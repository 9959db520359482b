//! Search filter templates
//!
//! Templates use printf-style named placeholders: `%(username)s` is replaced
//! by the escaped login and `%%` is a literal percent sign. Any other `%`
//! sequence is rejected.

use ldap3::ldap_escape;
use thiserror::Error;

const USERNAME_PLACEHOLDER: &str = "%(username)s";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    #[error("unsupported format sequence at offset {0}")]
    UnsupportedSequence(usize),

    #[error("incomplete format sequence at end of template")]
    Incomplete,
}

/// Substitute `username` into `template`, escaping it per RFC 4515
pub fn render_filter(template: &str, username: &str) -> Result<String, FilterError> {
    let escaped = ldap_escape(username);
    let mut filter = String::with_capacity(template.len() + escaped.len());
    let mut rest = template;

    while let Some(pos) = rest.find('%') {
        filter.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        let offset = template.len() - tail.len();

        if tail.starts_with(USERNAME_PLACEHOLDER) {
            filter.push_str(&escaped);
            rest = &tail[USERNAME_PLACEHOLDER.len()..];
        } else if tail.starts_with("%%") {
            filter.push('%');
            rest = &tail[2..];
        } else if tail.len() == 1 {
            return Err(FilterError::Incomplete);
        } else {
            return Err(FilterError::UnsupportedSequence(offset));
        }
    }
    filter.push_str(rest);

    Ok(filter)
}
