use std::fmt;
use std::time::Duration;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse board: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid board: {0}")]
    Invalid(String),
}

/// Visual preset requested for the background shader.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ShaderMode {
    #[default]
    Soft,
    Extreme,
}

/// Easing applied when one item crossfades into the next.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransitionCurve {
    #[default]
    Linear,
    Smoothstep,
    EaseInOut,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SlideOrder {
    #[default]
    Sequential,
    Shuffle,
}

/// One entry on the board. Each kind carries only the fields it uses.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BoardItem {
    Image {
        url: String,
    },
    Video {
        url: String,
    },
    Text {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        author: Option<String>,
    },
    Audio {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
    },
    Pdf {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
    },
}

impl BoardItem {
    pub fn kind(&self) -> &'static str {
        match self {
            BoardItem::Image { .. } => "image",
            BoardItem::Video { .. } => "video",
            BoardItem::Text { .. } => "text",
            BoardItem::Audio { .. } => "audio",
            BoardItem::Pdf { .. } => "pdf",
        }
    }

    pub fn url(&self) -> Option<&str> {
        match self {
            BoardItem::Image { url }
            | BoardItem::Video { url }
            | BoardItem::Audio { url, .. }
            | BoardItem::Pdf { url, .. } => Some(url),
            BoardItem::Text { .. } => None,
        }
    }

    /// Images and videos can drive the background; other kinds cannot.
    pub fn is_visual(&self) -> bool {
        matches!(self, BoardItem::Image { .. } | BoardItem::Video { .. })
    }

    pub fn is_video(&self) -> bool {
        matches!(self, BoardItem::Video { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ShaderSettings {
    #[serde(default)]
    pub mode: ShaderMode,
    #[serde(default)]
    pub motion_blur: bool,
    #[serde(default = "default_blur_intensity")]
    pub motion_blur_intensity: f32,
    #[serde(
        default = "default_transition",
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    pub transition: Duration,
    #[serde(default)]
    pub curve: TransitionCurve,
    #[serde(
        default,
        deserialize_with = "deserialize_duration_opt",
        serialize_with = "serialize_duration_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub load_timeout: Option<Duration>,
}

impl Default for ShaderSettings {
    fn default() -> Self {
        Self {
            mode: ShaderMode::Soft,
            motion_blur: false,
            motion_blur_intensity: default_blur_intensity(),
            transition: default_transition(),
            curve: TransitionCurve::Linear,
            load_timeout: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SlideshowSettings {
    #[serde(
        default = "default_interval",
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    pub interval: Duration,
    #[serde(default)]
    pub order: SlideOrder,
    #[serde(default)]
    pub paused: bool,
    /// Index into the displayable items to show first.
    #[serde(default)]
    pub start: usize,
}

impl Default for SlideshowSettings {
    fn default() -> Self {
        Self {
            interval: default_interval(),
            order: SlideOrder::Sequential,
            paused: false,
            start: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BoardConfig {
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default)]
    pub shader: ShaderSettings,
    #[serde(default)]
    pub slideshow: SlideshowSettings,
    #[serde(default)]
    pub items: Vec<BoardItem>,
}

fn default_blur_intensity() -> f32 {
    0.5
}

fn default_transition() -> Duration {
    Duration::from_secs(2)
}

fn default_interval() -> Duration {
    Duration::from_secs(8)
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    deserialize_duration_opt(deserializer)?
        .ok_or_else(|| de::Error::custom("duration may not be empty"))
}

fn deserialize_duration_opt<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = Option<Duration>;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a duration as number of seconds or human-readable string")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            humantime::parse_duration(v.trim())
                .map(Some)
                .map_err(|err| E::custom(format!("invalid duration '{v}': {err}")))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(Duration::from_secs(v)))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v < 0 {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Some(Duration::from_secs(v as u64)))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if !v.is_finite() || v.is_sign_negative() {
                return Err(E::custom("duration must be non-negative"));
            }
            Duration::try_from_secs_f64(v)
                .map(Some)
                .map_err(|err| E::custom(format!("invalid duration {v}: {err}")))
        }

        fn visit_none<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }
    }

    deserializer.deserialize_any(Visitor)
}

fn serialize_duration<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&humantime::format_duration(*value).to_string())
}

fn serialize_duration_opt<S>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match value {
        Some(duration) => serialize_duration(duration, serializer),
        None => serializer.serialize_none(),
    }
}

/// Parses a duration the same way board files do.
pub fn parse_duration(raw: &str) -> Result<Duration, String> {
    let trimmed = raw.trim();
    if let Ok(seconds) = trimmed.parse::<f64>() {
        if !seconds.is_finite() || seconds.is_sign_negative() {
            return Err(format!("invalid duration '{raw}': must be non-negative"));
        }
        return Duration::try_from_secs_f64(seconds)
            .map_err(|err| format!("invalid duration '{raw}': {err}"));
    }
    humantime::parse_duration(trimmed).map_err(|err| format!("invalid duration '{raw}': {err}"))
}

impl BoardConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: BoardConfig = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    /// An untitled board showing `urls` in order. Videos are recognised by extension.
    pub fn from_sources<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let items = urls
            .into_iter()
            .map(|url| {
                let url = url.into();
                if looks_like_video(&url) {
                    BoardItem::Video { url }
                } else {
                    BoardItem::Image { url }
                }
            })
            .collect();
        Self {
            version: 1,
            title: None,
            author: None,
            shader: ShaderSettings::default(),
            slideshow: SlideshowSettings::default(),
            items,
        }
    }

    pub fn visual_items(&self) -> impl Iterator<Item = &BoardItem> {
        self.items.iter().filter(|item| item.is_visual())
    }

    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != 1 {
            return Err(ConfigError::Invalid(format!(
                "unsupported board version {}; expected 1",
                self.version
            )));
        }

        let intensity = self.shader.motion_blur_intensity;
        if !(0.0..=1.0).contains(&intensity) {
            return Err(ConfigError::Invalid(format!(
                "shader.motion_blur_intensity must be within [0, 1], got {intensity}"
            )));
        }

        if self.shader.transition.is_zero() {
            return Err(ConfigError::Invalid(
                "shader.transition must be greater than zero".into(),
            ));
        }

        if let Some(timeout) = self.shader.load_timeout {
            if timeout.is_zero() {
                return Err(ConfigError::Invalid(
                    "shader.load_timeout must be greater than zero when set".into(),
                ));
            }
        }

        if self.slideshow.interval.is_zero() {
            return Err(ConfigError::Invalid(
                "slideshow.interval must be greater than zero".into(),
            ));
        }

        for (index, item) in self.items.iter().enumerate() {
            match item {
                BoardItem::Text { text, .. } => {
                    if text.trim().is_empty() {
                        return Err(ConfigError::Invalid(format!(
                            "item {index} (text) must not be empty"
                        )));
                    }
                }
                other => {
                    let url = other.url().unwrap_or_default();
                    validate_url(url).map_err(|reason| {
                        ConfigError::Invalid(format!("item {index} ({}) {reason}", other.kind()))
                    })?;
                }
            }
        }

        let visual = self.visual_items().count();
        if visual > 0 && self.slideshow.start >= visual {
            return Err(ConfigError::Invalid(format!(
                "slideshow.start is {} but the board only has {visual} image/video items",
                self.slideshow.start
            )));
        }

        Ok(())
    }
}

fn validate_url(url: &str) -> Result<(), String> {
    let url = url.trim();
    if url.is_empty() {
        return Err("has an empty url".into());
    }
    if let Some((scheme, rest)) = url.split_once("://") {
        if !matches!(scheme, "http" | "https" | "file") {
            return Err(format!("uses unsupported scheme '{scheme}'"));
        }
        if rest.is_empty() {
            return Err("has an empty url".into());
        }
    }
    Ok(())
}

fn looks_like_video(url: &str) -> bool {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let extension = path
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    matches!(
        extension.as_str(),
        "mp4" | "webm" | "mov" | "mkv" | "m4v" | "avi" | "ogv"
    )
}
