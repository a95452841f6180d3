use std::env;

pub const DEFAULT_WIDTH: u32 = 640;
pub const DEFAULT_HEIGHT: u32 = 480;

/// Startup settings: built-in defaults, overridden by the environment.
#[derive(Clone, Debug, PartialEq)]
pub struct AppConfig {
    pub width: u32,
    pub height: u32,
    pub title: String,
    pub min_image_count: u32,
    /// Straight (not premultiplied) RGBA.
    pub background: [f32; 4],
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            title: env!("CARGO_PKG_NAME").to_string(),
            min_image_count: 2,
            background: [0.1, 0.1, 0.1, 1.0],
        }
    }
}

impl AppConfig {
    /// Defaults with `WIN_SIZE="<w>x<h>"` applied when it is set.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(geometry) = env::var("WIN_SIZE") {
            (config.width, config.height) =
                parse_win_size(&geometry, (config.width, config.height));
        }
        config
    }
}

/// Parses `"<w>x<h>"`. Without an `x` only the width is taken. Each part is
/// read from its leading digits, so `"1280x720px"` is 1280x720; a part with
/// no leading digits, or zero, keeps its default.
pub fn parse_win_size(geometry: &str, default: (u32, u32)) -> (u32, u32) {
    let (width, height) = match geometry.split_once('x') {
        Some((w, h)) => (w, Some(h)),
        None => {
            tracing::warn!("Malformed WIN_SIZE {:?}, using default height.", geometry);
            (geometry, None)
        }
    };

    let width = dimension(width, default.0, "width");
    let height = height.map_or(default.1, |h| dimension(h, default.1, "height"));
    (width, height)
}

fn dimension(text: &str, default: u32, what: &str) -> u32 {
    let text = text.trim_start();
    let digits = text
        .find(|c: char| !c.is_ascii_digit())
        .map_or(text, |end| &text[..end]);

    match digits.parse::<u32>() {
        Ok(value) if value > 0 => value,
        _ => {
            tracing::warn!("Invalid WIN_SIZE {} {:?}, using {}.", what, text, default);
            default
        }
    }
}
