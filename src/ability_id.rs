use regex::Regex;
use sha2::{Digest, Sha256};

pub const RESOURCE_SWAP_ABILITY_ID: i64 = 9999;
pub const NO_ABILITY_ID: i64 = -1;
pub const UNRESOLVED_ABILITY_ID: i64 = -9999;
pub const DROPPED_ABILITY_ID: i64 = 0;
pub const DEFAULT_FALLBACK_RANGE: u64 = 1_000_000;

const RENDER_FILE_BASE_URL: &str = "https://render.guildwars2.com/file";
const CACHE_URL_PREFIXES: [&str; 2] = [
    "/cache/https_render.guildwars2.com_file_",
    "/cache/https_wiki.guildwars2.com_images_",
];
const SYMBOLIC_ICON_NAMES: [(&str, i64); 3] = [
    ("button", RESOURCE_SWAP_ABILITY_ID),
    ("weapon_swap", RESOURCE_SWAP_ABILITY_ID),
    ("weaponswap", RESOURCE_SWAP_ABILITY_ID),
];

lazy_static::lazy_static! {
    static ref TRAILING_DIGITS: Regex = Regex::new(r"(\d+)$").expect("trailing digit pattern");
    static ref LEGACY_ICON_SUFFIX: Regex =
        Regex::new(r"_(\d+)\.[A-Za-z]+$").expect("legacy icon suffix pattern");
    static ref DIGIT_RUN: Regex = Regex::new(r"\d+").expect("digit run pattern");
}

/// Which rule of the fallback chain produced an ability id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionSource {
    Numeric,
    FilenameStem,
    HashSegment,
    Symbolic,
    HashFallback,
    TrailingNumber,
    Unresolvable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub id: i64,
    pub source: ResolutionSource,
}

impl Resolution {
    fn new(id: i64, source: ResolutionSource) -> Self {
        Self { id, source }
    }

    fn unresolvable() -> Self {
        Self::new(DROPPED_ABILITY_ID, ResolutionSource::Unresolvable)
    }

    pub fn is_dropped(&self) -> bool {
        self.id == DROPPED_ABILITY_ID
    }
}

#[derive(Debug, Clone)]
pub struct AbilityIdResolver {
    fallback_range: u64,
}

impl Default for AbilityIdResolver {
    fn default() -> Self {
        Self::new(DEFAULT_FALLBACK_RANGE)
    }
}

impl AbilityIdResolver {
    pub fn new(fallback_range: u64) -> Self {
        Self {
            fallback_range: fallback_range.max(1),
        }
    }

    pub fn resolve(&self, fragment: &str) -> i64 {
        self.resolve_detailed(fragment).id
    }

    pub fn resolve_detailed(&self, fragment: &str) -> Resolution {
        let trimmed_fragment = strip_query_and_fragment(fragment.trim());
        if trimmed_fragment.is_empty() {
            return Resolution::unresolvable();
        }

        if let Ok(ability_id) = trimmed_fragment.parse::<i64>() {
            return Resolution::new(ability_id, ResolutionSource::Numeric);
        }

        let rewritten_cache_url = rewrite_cache_url(trimmed_fragment);
        let candidate = rewritten_cache_url.as_deref().unwrap_or(trimmed_fragment);

        if let Some((hash_segment, file_name)) = split_file_path(candidate) {
            return self.resolve_file_path(hash_segment, file_name);
        }

        if let Some(ability_id) = LEGACY_ICON_SUFFIX
            .captures(candidate)
            .and_then(|captures| captures.get(1))
            .and_then(|value| value.as_str().parse::<i64>().ok())
        {
            return Resolution::new(ability_id, ResolutionSource::FilenameStem);
        }

        last_digit_run(candidate)
            .map(|ability_id| Resolution::new(ability_id, ResolutionSource::TrailingNumber))
            .unwrap_or_else(Resolution::unresolvable)
    }

    fn resolve_file_path(&self, hash_segment: &str, file_name: &str) -> Resolution {
        let file_stem = file_name
            .rsplit_once('.')
            .map(|(stem, _)| stem)
            .unwrap_or(file_name);

        if let Some(ability_id) = TRAILING_DIGITS
            .captures(file_stem)
            .and_then(|captures| captures.get(1))
            .and_then(|value| value.as_str().parse::<i64>().ok())
        {
            return Resolution::new(ability_id, ResolutionSource::FilenameStem);
        }

        if let Some(ability_id) = hash_segment
            .split(['_', '-', '.'])
            .filter(|token| !token.is_empty() && token.chars().all(|value| value.is_ascii_digit()))
            .find_map(|token| token.parse::<i64>().ok())
        {
            return Resolution::new(ability_id, ResolutionSource::HashSegment);
        }

        if let Some(ability_id) = symbolic_ability_id(file_stem)
            .or_else(|| symbolic_ability_id(hash_segment))
        {
            return Resolution::new(ability_id, ResolutionSource::Symbolic);
        }

        Resolution::new(
            self.hashed_ability_id(hash_segment, file_name),
            ResolutionSource::HashFallback,
        )
    }

    fn hashed_ability_id(&self, hash_segment: &str, file_name: &str) -> i64 {
        let mut hasher = Sha256::new();
        hasher.update(hash_segment.as_bytes());
        hasher.update(b"/");
        hasher.update(file_name.as_bytes());
        let digest = hasher.finalize();

        let mut leading_bytes = [0_u8; 8];
        leading_bytes.copy_from_slice(&digest[..8]);
        let bounded = u64::from_be_bytes(leading_bytes) % self.fallback_range + 1;
        i64::try_from(bounded).unwrap_or(i64::MAX)
    }
}

/// Rewrites report-cache icon paths to the render CDN, absolutises other
/// relative paths against `report_host`, and passes absolute URLs through.
pub fn canonical_icon_url(icon_source: &str, report_host: &str) -> String {
    let trimmed_source = icon_source.trim();
    if trimmed_source.is_empty() {
        return String::new();
    }

    if let Some(render_url) = rewrite_cache_url(trimmed_source) {
        return render_url;
    }

    if trimmed_source.starts_with("http://") || trimmed_source.starts_with("https://") {
        return trimmed_source.to_string();
    }

    if let Some(scheme_relative) = trimmed_source.strip_prefix("//") {
        return format!("https://{scheme_relative}");
    }

    let host = report_host.trim_end_matches('/');
    if trimmed_source.starts_with('/') {
        format!("{host}{trimmed_source}")
    } else {
        format!("{host}/{trimmed_source}")
    }
}

fn rewrite_cache_url(icon_source: &str) -> Option<String> {
    let remainder = CACHE_URL_PREFIXES.iter().find_map(|prefix| {
        icon_source
            .find(prefix)
            .map(|position| &icon_source[position + prefix.len()..])
    })?;

    let (hash_part, id_with_extension) = remainder.rsplit_once('_')?;
    if hash_part.is_empty() {
        return None;
    }

    let icon_id = id_with_extension
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(id_with_extension);

    Some(format!("{RENDER_FILE_BASE_URL}/{hash_part}/{icon_id}.png"))
}

fn split_file_path(icon_source: &str) -> Option<(&str, &str)> {
    let position = icon_source.rfind("/file/")?;
    let remainder = &icon_source[position + "/file/".len()..];
    let (hash_segment, file_name) = remainder.split_once('/')?;

    if hash_segment.is_empty() || file_name.is_empty() || file_name.contains('/') {
        return None;
    }

    Some((hash_segment, file_name))
}

fn symbolic_ability_id(name: &str) -> Option<i64> {
    let lower_name = name.to_ascii_lowercase();
    SYMBOLIC_ICON_NAMES
        .iter()
        .find(|(symbol, _)| *symbol == lower_name)
        .map(|(_, ability_id)| *ability_id)
}

fn last_digit_run(value: &str) -> Option<i64> {
    DIGIT_RUN
        .find_iter(value)
        .last()
        .and_then(|digits| digits.as_str().parse::<i64>().ok())
}

fn strip_query_and_fragment(value: &str) -> &str {
    let end = value.find(['?', '#']).unwrap_or(value.len());
    &value[..end]
}

#[cfg(test)]
mod tests {
    use super::{
        canonical_icon_url, AbilityIdResolver, ResolutionSource, DROPPED_ABILITY_ID,
        RESOURCE_SWAP_ABILITY_ID,
    };

    #[test]
    fn resolves_bare_numeric_identifiers() {
        let resolver = AbilityIdResolver::default();

        assert_eq!(resolver.resolve("10219"), 10219);
        assert_eq!(resolver.resolve(" -1 "), -1);
        assert_eq!(
            resolver.resolve_detailed("5526").source,
            ResolutionSource::Numeric
        );
    }

    #[test]
    fn prefers_numeric_filename_over_hash_segment() {
        let resolver = AbilityIdResolver::default();
        let resolution = resolver.resolve_detailed(
            "https://render.guildwars2.com/file/592CC2A120322000BC7234B8522BBE7BAF2F4A57/1029987.png",
        );

        assert_eq!(resolution.id, 1029987);
        assert_eq!(resolution.source, ResolutionSource::FilenameStem);
    }

    #[test]
    fn resolves_legacy_cache_prefixed_icons() {
        let resolver = AbilityIdResolver::default();

        assert_eq!(
            resolver.resolve(
                "/cache/https_render.guildwars2.com_file_592CC2A120322000BC7234B8522BBE7BAF2F4A57_1029987.png"
            ),
            1029987
        );
        assert_eq!(
            resolver.resolve("https://dps.report/cache/https_wiki.guildwars2.com_images_abc_42.png"),
            42
        );
    }

    #[test]
    fn resource_swap_button_resolves_to_sentinel_not_hash() {
        let resolver = AbilityIdResolver::default();
        let resolution =
            resolver.resolve_detailed("https://render.example.com/file/abc123/Button.png");

        assert_eq!(resolution.id, RESOURCE_SWAP_ABILITY_ID);
        assert_eq!(resolution.source, ResolutionSource::Symbolic);
    }

    #[test]
    fn uses_numeric_token_inside_hash_segment() {
        let resolver = AbilityIdResolver::default();
        let resolution =
            resolver.resolve_detailed("https://render.guildwars2.com/file/ABCDEF_40183/Icon.png");

        assert_eq!(resolution.id, 40183);
        assert_eq!(resolution.source, ResolutionSource::HashSegment);
    }

    #[test]
    fn hash_fallback_is_deterministic_and_bounded() {
        let resolver = AbilityIdResolver::new(500);
        let icon_url = "https://render.guildwars2.com/file/ABCDEF/Decoration.png";

        let first = resolver.resolve_detailed(icon_url);
        let second = resolver.resolve_detailed(icon_url);

        assert_eq!(first, second);
        assert_eq!(first.source, ResolutionSource::HashFallback);
        assert!((1..=500).contains(&first.id), "Fallback id out of range: {}", first.id);
        assert_ne!(
            resolver.resolve("https://render.guildwars2.com/file/FEDCBA/Decoration.png"),
            DROPPED_ABILITY_ID
        );
    }

    #[test]
    fn unmatched_fragments_fall_back_to_last_number_or_drop() {
        let resolver = AbilityIdResolver::default();

        assert_eq!(resolver.resolve("/images/skill-12/icon-884.jpg"), 884);
        assert_eq!(resolver.resolve("/images/blank.png"), DROPPED_ABILITY_ID);
        assert!(resolver.resolve_detailed("").is_dropped());
    }

    #[test]
    fn canonicalizes_icon_sources() {
        assert_eq!(
            canonical_icon_url(
                "/cache/https_render.guildwars2.com_file_ABC123_5526.png",
                "https://dps.report"
            ),
            "https://render.guildwars2.com/file/ABC123/5526.png"
        );
        assert_eq!(
            canonical_icon_url("/images/icon.png", "https://dps.report/"),
            "https://dps.report/images/icon.png"
        );
        assert_eq!(
            canonical_icon_url("https://render.guildwars2.com/file/X/1.png", "https://dps.report"),
            "https://render.guildwars2.com/file/X/1.png"
        );
        assert_eq!(canonical_icon_url("  ", "https://dps.report"), "");
    }
}
