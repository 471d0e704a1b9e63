use std::path::{Component, Path, PathBuf};

use crate::config::ScraperConfig;
use crate::error::TemplateError;

use super::EpisodeRecord;

/// Characters stripped from titles before they become filenames
const STRIPPED_CHARS: &[char] = &['!', '?', '$', '/', ':', ';', '"', '\u{0000}', '\u{0093}', 'â'];

/// Clean up a title so it can be used as part of a filename
///
/// Removes punctuation that misbehaves in paths and turns `", "` into
/// `" - "`, then applies a portable filename sanitizer for anything left.
pub fn tidy_up_title(title: &str) -> String {
    let stripped: String = title.chars().filter(|c| !STRIPPED_CHARS.contains(c)).collect();
    let dashed = stripped.replace(", ", " - ");
    sanitize_filename::sanitize(dashed)
}

/// Left-pad a number with zeros to at least `width` characters
pub fn zero_pad(value: &str, width: usize) -> String {
    let len = value.chars().count();
    if len >= width {
        value.to_string()
    } else {
        format!("{}{}", "0".repeat(width - len), value)
    }
}

/// Values available to the download path template
#[derive(Debug, Clone, Default)]
struct PathValues {
    ep_title: String,
    ep_number: Option<String>,
    season: Option<String>,
}

impl PathValues {
    fn lookup(&self, key: &str) -> Result<&str, TemplateError> {
        match key {
            "ep_title" => Ok(&self.ep_title),
            "ep_number" => self
                .ep_number
                .as_deref()
                .ok_or(TemplateError::MissingValue("ep_number")),
            "season" => self
                .season
                .as_deref()
                .ok_or(TemplateError::MissingValue("season")),
            other => Err(TemplateError::UnknownKey(other.to_string())),
        }
    }
}

/// Render a download path template such as `"S{season}/{ep_number} - {ep_title}.mp3"`
///
/// `{{` and `}}` produce literal braces.
pub fn render_template(
    format: &str,
    ep_title: &str,
    ep_number: Option<&str>,
    season: Option<&str>,
) -> Result<String, TemplateError> {
    let values = PathValues {
        ep_title: ep_title.to_string(),
        ep_number: ep_number.map(String::from),
        season: season.map(String::from),
    };

    let mut rendered = String::with_capacity(format.len() + ep_title.len());
    let mut chars = format.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                rendered.push('{');
            }
            '{' => {
                let mut key = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(k) => key.push(k),
                        None => return Err(TemplateError::UnbalancedBrace(format.to_string())),
                    }
                }
                rendered.push_str(values.lookup(&key)?);
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                rendered.push('}');
            }
            '}' => return Err(TemplateError::UnbalancedBrace(format.to_string())),
            other => rendered.push(other),
        }
    }

    Ok(rendered)
}

/// Check that a feed-supplied number or season can stand in for a single
/// file name fragment
fn path_fragment(key: &'static str, value: &str) -> Result<String, TemplateError> {
    let value = value.trim();
    if value.is_empty() || sanitize_filename::sanitize(value) != value {
        return Err(TemplateError::UnsafeValue {
            key,
            value: value.to_string(),
        });
    }
    Ok(value.to_string())
}

/// Compute where an episode is stored: `{save_path}/{podcast name}/{rendered template}`
///
/// Pure function of the config and the episode's resolved title, number
/// and season; calling it again always yields the same path. Numbers and
/// seasons that would change the directory structure are rejected, as is
/// a rendered path that is absolute or climbs out of the podcast home.
pub fn download_path(config: &ScraperConfig, episode: &EpisodeRecord) -> Result<PathBuf, TemplateError> {
    let ep_title = tidy_up_title(&episode.title);
    let ep_number = episode
        .episode_number
        .as_deref()
        .map(|n| path_fragment("ep_number", n).map(|n| zero_pad(&n, config.min_episode_width)))
        .transpose()?;
    let season = episode
        .season
        .as_deref()
        .map(|s| path_fragment("season", s).map(|s| zero_pad(&s, config.min_season_width)))
        .transpose()?;

    let filename = render_template(
        &config.download_path_format,
        &ep_title,
        ep_number.as_deref(),
        season.as_deref(),
    )?;

    let relative = Path::new(&filename);
    let contained = relative.components().next().is_some()
        && relative
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
    if !contained {
        return Err(TemplateError::OutsideHome(filename));
    }

    Ok(config.podcast_home().join(relative))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_config(format: &str) -> ScraperConfig {
        let mut config = ScraperConfig::new("My Podcast", "https://example.com/feed.xml", "/archive");
        config.download_path_format = format.to_string();
        config.min_episode_width = 3;
        config.min_season_width = 2;
        config
    }

    fn make_episode(title: &str, number: Option<&str>, season: Option<&str>) -> EpisodeRecord {
        let mut episode = EpisodeRecord::new(title);
        episode.episode_number = number.map(String::from);
        episode.season = season.map(String::from);
        episode
    }

    // === Title tidying ===

    #[test]
    fn tidy_strips_exclamation() {
        assert_eq!(tidy_up_title("Bonus Ep!"), "Bonus Ep");
    }

    #[test]
    fn tidy_strips_path_and_shell_punctuation() {
        assert_eq!(tidy_up_title("What? $5/month: yes; \"no\""), "What 5month yes no");
    }

    #[test]
    fn tidy_replaces_comma_space_with_dash() {
        assert_eq!(tidy_up_title("Cats, Dogs, Birds"), "Cats - Dogs - Birds");
    }

    #[test]
    fn tidy_keeps_comma_without_space() {
        assert_eq!(tidy_up_title("1,000 Days"), "1,000 Days");
    }

    #[test]
    fn tidy_removes_stray_encoding_characters() {
        assert_eq!(tidy_up_title("\u{0093}Quoted\u{0000}"), "Quoted");
        assert_eq!(tidy_up_title("Itâs here"), "Its here");
    }

    #[test]
    fn tidy_drops_remaining_reserved_characters() {
        assert_eq!(tidy_up_title("a<b>c|d*e"), "abcde");
    }

    // === Padding ===

    #[test]
    fn zero_pad_extends_short_numbers() {
        assert_eq!(zero_pad("7", 3), "007");
    }

    #[test]
    fn zero_pad_leaves_wide_numbers_alone() {
        assert_eq!(zero_pad("1234", 3), "1234");
        assert_eq!(zero_pad("12", 0), "12");
    }

    // === Template rendering ===

    #[test]
    fn render_substitutes_all_keys() {
        let rendered = render_template(
            "S{season}/{ep_number} - {ep_title}.mp3",
            "Pilot",
            Some("001"),
            Some("01"),
        )
        .unwrap();
        assert_eq!(rendered, "S01/001 - Pilot.mp3");
    }

    #[test]
    fn render_supports_escaped_braces() {
        let rendered = render_template("{{{ep_title}}}.mp3", "Pilot", None, None).unwrap();
        assert_eq!(rendered, "{Pilot}.mp3");
    }

    #[test]
    fn render_rejects_unknown_key() {
        let err = render_template("{guest}.mp3", "Pilot", None, None).unwrap_err();
        assert_eq!(err, TemplateError::UnknownKey("guest".to_string()));
    }

    #[test]
    fn render_rejects_missing_season() {
        let err = render_template("{season}/{ep_title}.mp3", "Pilot", Some("1"), None).unwrap_err();
        assert_eq!(err, TemplateError::MissingValue("season"));
    }

    #[test]
    fn render_rejects_missing_episode_number() {
        let err = render_template("{ep_number}.mp3", "Pilot", None, None).unwrap_err();
        assert_eq!(err, TemplateError::MissingValue("ep_number"));
    }

    #[test]
    fn render_rejects_unbalanced_braces() {
        assert!(matches!(
            render_template("{ep_title.mp3", "Pilot", None, None),
            Err(TemplateError::UnbalancedBrace(_))
        ));
        assert!(matches!(
            render_template("ep_title}.mp3", "Pilot", None, None),
            Err(TemplateError::UnbalancedBrace(_))
        ));
    }

    // === Download paths ===

    #[test]
    fn download_path_joins_home_and_rendered_name() {
        let config = make_config("{ep_number} - {ep_title}.mp3");
        let episode = make_episode("Bonus Ep!", Some("5"), None);

        let path = download_path(&config, &episode).unwrap();
        assert_eq!(path, PathBuf::from("/archive/My Podcast/005 - Bonus Ep.mp3"));
    }

    #[test]
    fn download_path_pads_season() {
        let config = make_config("Season {season}/{ep_number} - {ep_title}.mp3");
        let episode = make_episode("Pilot", Some("1"), Some("2"));

        let path = download_path(&config, &episode).unwrap();
        assert_eq!(
            path,
            PathBuf::from("/archive/My Podcast/Season 02/001 - Pilot.mp3")
        );
    }

    #[test]
    fn download_path_uses_resolved_title_not_raw_title() {
        let config = make_config("{ep_title}.mp3");
        let mut episode = make_episode("12: Resolved", None, None);
        episode.title = "Resolved".to_string();

        let path = download_path(&config, &episode).unwrap();
        assert_eq!(path, PathBuf::from("/archive/My Podcast/Resolved.mp3"));
    }

    #[test]
    fn download_path_is_deterministic() {
        let config = make_config("Season {season}/{ep_number} - {ep_title}.mp3");
        let episode = make_episode("Cats, Dogs!", Some("9"), Some("3"));

        let first = download_path(&config, &episode).unwrap();
        for _ in 0..10 {
            assert_eq!(download_path(&config, &episode).unwrap(), first);
        }
        assert_eq!(download_path(&config, &episode.clone()).unwrap(), first);
    }

    #[test]
    fn download_path_rejects_traversal_in_episode_number() {
        let config = make_config("{ep_number} - {ep_title}.mp3");
        let episode = make_episode("Pwn", Some("../../victim/x"), None);

        assert_eq!(
            download_path(&config, &episode),
            Err(TemplateError::UnsafeValue {
                key: "ep_number",
                value: "../../victim/x".to_string(),
            })
        );
    }

    #[test]
    fn download_path_rejects_dot_dot_season() {
        let config = make_config("Season {season}/{ep_title}.mp3");
        let episode = make_episode("Pilot", Some("1"), Some(".."));

        assert!(matches!(
            download_path(&config, &episode),
            Err(TemplateError::UnsafeValue { key: "season", .. })
        ));
    }

    #[test]
    fn download_path_rejects_templates_leaving_the_home() {
        let episode = make_episode("Pilot", Some("1"), None);

        for format in ["../{ep_title}.mp3", "/tmp/{ep_title}.mp3", "a/../../{ep_title}.mp3", ""] {
            let config = make_config(format);
            assert!(
                matches!(download_path(&config, &episode), Err(TemplateError::OutsideHome(_))),
                "format {format:?} was accepted"
            );
        }
    }
}
