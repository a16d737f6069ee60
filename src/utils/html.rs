use ammonia;

/// Clean user-supplied HTML using the ammonia library.
///
/// Competition titles and descriptions are shown to every participant, so
/// they pass through a whitelist sanitizer: safe tags (like <b>, <p>) stay,
/// <script> and <iframe> are removed along with their content, and event
/// attributes such as onclick are stripped.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}
