//! Keyword classification for incoming requests and the advisory routing
//! label derived from it.

use crate::shared::models::{GroupLabel, RequestCategory};

const TECHNICAL_KEYWORDS: &[&str] = &[
    "ошибка",
    "не работает",
    "сломалось",
    "баг",
    "bug",
    "error",
    "технический",
    "система",
    "программа",
    "приложение",
    "сервер",
    "интернет",
    "сеть",
    "компьютер",
    "принтер",
    "сканер",
    "оборудование",
];

const CONTENT_KEYWORDS: &[&str] = &[
    "контент",
    "статья",
    "текст",
    "изображение",
    "фото",
    "видео",
    "публикация",
    "материал",
    "информация",
    "документ",
    "файл",
    "редактирование",
    "изменение",
    "добавить",
    "удалить",
];

fn score(text: &str, keywords: &[&str]) -> usize {
    // Each keyword contributes at most once however often it appears.
    keywords
        .iter()
        .filter(|&&keyword| text.contains(keyword))
        .count()
}

/// Derives a category from the lowercased concatenation of title and
/// description. A strict keyword majority picks Technical or Content;
/// ties and keyword-free text stay Uncategorized.
pub fn classify(title: &str, description: &str) -> RequestCategory {
    let text = format!("{} {}", title, description).to_lowercase();
    let technical_score = score(&text, TECHNICAL_KEYWORDS);
    let content_score = score(&text, CONTENT_KEYWORDS);
    if technical_score > content_score && technical_score > 0 {
        RequestCategory::Technical
    } else if content_score > technical_score && content_score > 0 {
        RequestCategory::Content
    } else {
        RequestCategory::Uncategorized
    }
}

/// Maps a category to the team that usually handles it. Advisory only:
/// the label is logged, never stored and never checked on later actions.
pub fn resolve_group(category: RequestCategory) -> GroupLabel {
    match category {
        RequestCategory::Technical => GroupLabel::Support,
        RequestCategory::Content => GroupLabel::Moderator,
        RequestCategory::Other | RequestCategory::Uncategorized => GroupLabel::Admin,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_technical_majority() {
        assert_eq!(
            classify("Ошибка в системе", "Не работает принтер, выдает ошибку"),
            RequestCategory::Technical
        );
    }

    #[test]
    fn test_content_majority() {
        assert_eq!(
            classify("Добавить статью", "Нужно добавить новый контент на сайт"),
            RequestCategory::Content
        );
    }

    #[test]
    fn test_no_keywords_stays_uncategorized() {
        assert_eq!(classify("Вопрос", "Как дела?"), RequestCategory::Uncategorized);
    }

    #[test]
    fn test_tie_stays_uncategorized() {
        // One technical keyword against one content keyword.
        assert_eq!(classify("сервер", "контент"), RequestCategory::Uncategorized);
    }

    #[test]
    fn test_keyword_presence_counts_once() {
        // Three occurrences of one technical keyword lose to two distinct
        // content keywords.
        assert_eq!(
            classify("ошибка ошибка", "ошибка: контент и материал"),
            RequestCategory::Content
        );
    }

    #[test]
    fn test_match_inside_longer_word_and_mixed_case() {
        assert_eq!(
            classify("ПЕРЕЗАГРУЗКА СЕРВЕРА", ""),
            RequestCategory::Technical
        );
    }

    #[test]
    fn test_resolve_group_covers_every_category() {
        assert_eq!(resolve_group(RequestCategory::Technical), GroupLabel::Support);
        assert_eq!(resolve_group(RequestCategory::Content), GroupLabel::Moderator);
        assert_eq!(resolve_group(RequestCategory::Other), GroupLabel::Admin);
        assert_eq!(
            resolve_group(RequestCategory::Uncategorized),
            GroupLabel::Admin
        );
    }
}
