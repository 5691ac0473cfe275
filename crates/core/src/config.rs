//! Viewer configuration.
//!
//! Defaults describe the stock viewer window; command-line arguments
//! override individual fields:
//!
//! ```text
//! objview [MODEL] [--size WxH] [--tiling X,Y] [--scroll X,Y] [--fade START,END]
//!         [--validation | --no-validation]
//! ```

use std::path::{Path, PathBuf};

use clap::Parser;

use crate::{Error, Result};

/// Model locations tried when no model is given on the command line.
pub const FALLBACK_MODELS: &[&str] = &[
    "textures/broodmother.obj",
    "../textures/broodmother.obj",
    "../../textures/broodmother.obj",
    "../../../textures/broodmother.obj",
];

/// Runtime settings for the viewer.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewerConfig {
    /// Window title.
    pub title: String,
    /// Initial window width in pixels.
    pub width: u32,
    /// Initial window height in pixels.
    pub height: u32,
    /// Model given explicitly by the user.
    pub model: Option<PathBuf>,
    /// Texture coordinate multiplier.
    pub tex_tiling: [f32; 2],
    /// Texture scroll speed in UV units per second.
    pub tex_scroll: [f32; 2],
    /// Distance fade range; disabled while `end <= start`.
    pub fade: [f32; 2],
    /// Background color.
    pub clear_color: [f32; 4],
    /// Enable Vulkan validation layers.
    pub validation: bool,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            title: "objview".to_string(),
            width: 1280,
            height: 720,
            model: None,
            tex_tiling: [2.0, 2.0],
            tex_scroll: [0.05, 0.0],
            fade: [0.0, 0.0],
            clear_color: [0.1, 0.1, 0.15, 1.0],
            validation: cfg!(debug_assertions),
        }
    }
}

/// Window size given as `WxH`.
#[derive(Debug, Clone, Copy)]
struct Size {
    width: u32,
    height: u32,
}

fn parse_size(value: &str) -> std::result::Result<Size, String> {
    let (w, h) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WxH, got '{value}'"))?;
    let width: u32 = w.trim().parse().map_err(|_| format!("invalid width '{w}'"))?;
    let height: u32 = h.trim().parse().map_err(|_| format!("invalid height '{h}'"))?;
    if width == 0 || height == 0 {
        return Err("window size must be non-zero".to_string());
    }
    Ok(Size { width, height })
}

fn parse_pair(value: &str) -> std::result::Result<[f32; 2], String> {
    let (x, y) = value
        .split_once(',')
        .ok_or_else(|| format!("expected X,Y, got '{value}'"))?;
    let parse = |part: &str| {
        part.trim()
            .parse::<f32>()
            .map_err(|_| format!("invalid number '{part}'"))
    };
    Ok([parse(x)?, parse(y)?])
}

/// Viewer for Wavefront OBJ models.
#[derive(Parser, Debug)]
#[command(name = "objview", version)]
struct Args {
    /// OBJ file to open; the bundled sample locations are tried otherwise.
    model: Option<PathBuf>,

    /// Initial window size.
    #[arg(long, value_name = "WxH", value_parser = parse_size)]
    size: Option<Size>,

    /// Texture coordinate multiplier.
    #[arg(long, value_name = "X,Y", value_parser = parse_pair)]
    tiling: Option<[f32; 2]>,

    /// Texture scroll speed in UV units per second.
    #[arg(long, value_name = "X,Y", value_parser = parse_pair)]
    scroll: Option<[f32; 2]>,

    /// Distance fade range; ignored unless END is greater than START.
    #[arg(long, value_name = "START,END", value_parser = parse_pair)]
    fade: Option<[f32; 2]>,

    /// Enable Vulkan validation layers.
    #[arg(long, conflicts_with = "no_validation")]
    validation: bool,

    /// Disable Vulkan validation layers.
    #[arg(long, conflicts_with = "validation")]
    no_validation: bool,
}

impl From<Args> for ViewerConfig {
    fn from(args: Args) -> Self {
        let defaults = Self::default();
        let (width, height) = args
            .size
            .map_or((defaults.width, defaults.height), |size| (size.width, size.height));
        Self {
            width,
            height,
            model: args.model,
            tex_tiling: args.tiling.unwrap_or(defaults.tex_tiling),
            tex_scroll: args.scroll.unwrap_or(defaults.tex_scroll),
            fade: args.fade.unwrap_or(defaults.fade),
            // Explicit flags win over the build-profile default
            validation: args.validation || (!args.no_validation && defaults.validation),
            ..defaults
        }
    }
}

impl ViewerConfig {
    /// Reads the process command line.
    ///
    /// Prints usage and exits on `--help`, `--version` or a bad argument.
    pub fn from_env() -> Self {
        Args::parse().into()
    }

    /// Builds a configuration from `args`, program name first.
    pub fn from_args<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<std::ffi::OsString> + Clone,
    {
        Args::try_parse_from(args)
            .map(Self::from)
            .map_err(|e| Error::Config(e.to_string()))
    }

    /// Model paths to try, in order.
    ///
    /// An explicit model is tried alone. Otherwise each fallback location is
    /// tried relative to `exe_dir` first and then to the working directory.
    pub fn model_candidates(&self, exe_dir: Option<&Path>) -> Vec<PathBuf> {
        if let Some(model) = &self.model {
            return vec![model.clone()];
        }

        let mut candidates = Vec::with_capacity(FALLBACK_MODELS.len() * 2);
        if let Some(dir) = exe_dir {
            candidates.extend(FALLBACK_MODELS.iter().map(|rel| dir.join(rel)));
        }
        candidates.extend(FALLBACK_MODELS.iter().map(PathBuf::from));
        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ViewerConfig::default();
        assert_eq!((config.width, config.height), (1280, 720));
        assert_eq!(config.tex_tiling, [2.0, 2.0]);
        assert_eq!(config.tex_scroll, [0.05, 0.0]);
        assert_eq!(config.clear_color, [0.1, 0.1, 0.15, 1.0]);
        assert!(config.model.is_none());
    }

    #[test]
    fn test_parse_full_command_line() {
        let config = ViewerConfig::from_args([
            "objview",
            "scene.obj",
            "--size",
            "800x600",
            "--tiling",
            "4,1",
            "--scroll",
            "0,0.5",
            "--fade",
            "10,20",
            "--no-validation",
        ])
        .unwrap();

        assert_eq!(config.model, Some(PathBuf::from("scene.obj")));
        assert_eq!((config.width, config.height), (800, 600));
        assert_eq!(config.tex_tiling, [4.0, 1.0]);
        assert_eq!(config.tex_scroll, [0.0, 0.5]);
        assert_eq!(config.fade, [10.0, 20.0]);
        assert!(!config.validation);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(matches!(
            ViewerConfig::from_args(["objview", "--size", "800"]),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            ViewerConfig::from_args(["objview", "--size", "0x600"]),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            ViewerConfig::from_args(["objview", "--tiling", "a,b"]),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            ViewerConfig::from_args(["objview", "--scroll"]),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            ViewerConfig::from_args(["objview", "--bogus"]),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            ViewerConfig::from_args(["objview", "a.obj", "b.obj"]),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_validation_flags_conflict() {
        assert!(ViewerConfig::from_args(["objview", "--validation"]).unwrap().validation);
        assert!(matches!(
            ViewerConfig::from_args(["objview", "--validation", "--no-validation"]),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_explicit_model_is_the_only_candidate() {
        let config = ViewerConfig::from_args(["objview", "model.obj"]).unwrap();
        let candidates = config.model_candidates(Some(Path::new("/opt/objview")));
        assert_eq!(candidates, vec![PathBuf::from("model.obj")]);
    }

    #[test]
    fn test_fallback_candidates_prefer_exe_dir() {
        let config = ViewerConfig::default();
        let exe_dir = Path::new("/opt/objview");
        let candidates = config.model_candidates(Some(exe_dir));

        assert_eq!(candidates.len(), FALLBACK_MODELS.len() * 2);
        assert_eq!(candidates[0], exe_dir.join("textures/broodmother.obj"));
        assert_eq!(
            candidates[FALLBACK_MODELS.len()],
            PathBuf::from("textures/broodmother.obj")
        );
    }

    #[test]
    fn test_fallback_candidates_without_exe_dir() {
        let candidates = ViewerConfig::default().model_candidates(None);
        assert_eq!(candidates.len(), FALLBACK_MODELS.len());
    }
}
