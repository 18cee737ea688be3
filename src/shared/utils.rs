use diesel::{
    r2d2::{ConnectionManager, Pool, PoolError},
    PgConnection,
};

pub type DbPool = Pool<ConnectionManager<PgConnection>>;

pub fn create_conn(database_url: &str) -> Result<DbPool, PoolError> {
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    Pool::builder().build(manager)
}

/// Truncates to at most `limit` characters, never splitting a multibyte
/// character. Returns the input untouched when it already fits.
pub fn truncate_chars(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

/// Builds a `%term%` pattern for `ilike` with the LIKE metacharacters in
/// the term escaped, so searching for "100%" matches that text literally.
pub fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_chars_counts_characters_not_bytes() {
        let cyrillic = "Проблема с сервером";
        assert_eq!(truncate_chars(cyrillic, 8), "Проблема");
        assert_eq!(truncate_chars(cyrillic, 100), cyrillic);
        assert_eq!(truncate_chars("", 5), "");
    }

    #[test]
    fn test_truncate_chars_exact_limit() {
        assert_eq!(truncate_chars("abcde", 5), "abcde");
        assert_eq!(truncate_chars("abcde", 4), "abcd");
    }

    #[test]
    fn test_like_pattern_escapes_metacharacters() {
        assert_eq!(like_pattern("100%"), "%100\\%%");
        assert_eq!(like_pattern("user_name"), "%user\\_name%");
        assert_eq!(like_pattern("c:\\temp"), "%c:\\\\temp%");
        assert_eq!(like_pattern("обычный запрос"), "%обычный запрос%");
    }
}
