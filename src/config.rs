/// Settings of a sample application, with defaults that can be overridden
/// from the command line.
use std::ffi::OsString;
use std::path::PathBuf;

use clap::{App, Arg, ArgMatches};

#[derive(Debug, Clone, PartialEq)]
pub struct SampleConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    /// Overrides the default scene; setting one also makes the pipeline load
    /// it on the first frame.
    pub default_scene: Option<PathBuf>,
    pub environment_map: Option<String>,
    pub vsync: bool,
}

impl Default for SampleConfig {
    fn default() -> Self {
        Self {
            title: "Learn ray tracing with Rust".to_string(),
            width: 1920,
            height: 1080,
            default_scene: None,
            environment_map: None,
            vsync: true,
        }
    }
}

fn is_extent(text: String) -> Result<(), String> {
    match text.parse::<u32>() {
        Ok(0) => Err("window sizes must be at least one pixel".to_string()),
        Ok(_) => Ok(()),
        Err(_) => Err(format!("'{}' is not a size in pixels", text)),
    }
}

fn command_line<'a, 'b>() -> App<'a, 'b> {
    App::new("learn-raytracing-with-rust")
        .about("Ray tracing samples built from an editable pipeline of render passes")
        .arg(
            Arg::with_name("width")
                .long("width")
                .takes_value(true)
                .value_name("PIXELS")
                .help("Initial window width (default 1920)")
                .validator(is_extent),
        )
        .arg(
            Arg::with_name("height")
                .long("height")
                .takes_value(true)
                .value_name("PIXELS")
                .help("Initial window height (default 1080)")
                .validator(is_extent),
        )
        .arg(
            Arg::with_name("title")
                .long("title")
                .takes_value(true)
                .value_name("TEXT")
                .help("Window title"),
        )
        .arg(
            Arg::with_name("scene")
                .long("scene")
                .takes_value(true)
                .value_name("FILE")
                .help("Scene loaded on the first frame"),
        )
        .arg(
            Arg::with_name("env-map")
                .long("env-map")
                .takes_value(true)
                .value_name("FILE|NAME")
                .help("Environment map: an image file, \"Black\" or \"Carolina sky blue\""),
        )
        .arg(Arg::with_name("vsync").long("vsync").help("Wait for vertical sync (the default)"))
        .arg(
            Arg::with_name("no-vsync")
                .long("no-vsync")
                .conflicts_with("vsync")
                .help("Present frames as fast as possible"),
        )
}

impl SampleConfig {
    /// Parse command line arguments (without the program name). Asking for
    /// help also comes back as an error, of kind `HelpDisplayed`.
    pub fn from_args<I, S>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString> + Clone,
    {
        let program = std::iter::once(OsString::from("learn-raytracing-with-rust"));
        let matches = command_line().get_matches_from_safe(program.chain(args.into_iter().map(Into::into)))?;
        Ok(Self::from_matches(&matches))
    }

    fn from_matches(matches: &ArgMatches) -> Self {
        let defaults = Self::default();
        // the validators already checked the sizes
        let extent = |name: &str, default: u32| matches.value_of(name).and_then(|v| v.parse().ok()).unwrap_or(default);
        Self {
            title: matches.value_of("title").map_or(defaults.title, str::to_string),
            width: extent("width", defaults.width),
            height: extent("height", defaults.height),
            default_scene: matches.value_of_os("scene").map(PathBuf::from),
            environment_map: matches.value_of("env-map").map(str::to_string),
            vsync: !matches.is_present("no-vsync"),
        }
    }

    pub fn present_mode(&self) -> wgpu::PresentMode {
        if self.vsync {
            wgpu::PresentMode::AutoVsync
        } else {
            wgpu::PresentMode::AutoNoVsync
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_arguments_gives_defaults() {
        let config = SampleConfig::from_args(Vec::<String>::new()).unwrap();
        assert_eq!(config, SampleConfig::default());
        assert_eq!(config.present_mode(), wgpu::PresentMode::AutoVsync);
    }

    #[test]
    fn arguments_override_defaults() {
        let config = SampleConfig::from_args(["--width", "800", "--height", "600", "--scene", "cube.obj", "--no-vsync", "--env-map", "Black"])
            .unwrap();
        assert_eq!((config.width, config.height), (800, 600));
        assert_eq!(config.default_scene, Some(PathBuf::from("cube.obj")));
        assert_eq!(config.environment_map.as_deref(), Some("Black"));
        assert!(!config.vsync);
        assert_eq!(config.present_mode(), wgpu::PresentMode::AutoNoVsync);
    }

    #[test]
    fn help_and_bad_arguments() {
        let help = SampleConfig::from_args(["--help"]).unwrap_err();
        assert_eq!(help.kind, clap::ErrorKind::HelpDisplayed);
        assert!(SampleConfig::from_args(["--width"]).is_err());
        assert_eq!(SampleConfig::from_args(["--width", "0"]).unwrap_err().kind, clap::ErrorKind::ValueValidation);
        assert_eq!(SampleConfig::from_args(["--height", "tall"]).unwrap_err().kind, clap::ErrorKind::ValueValidation);
        assert!(SampleConfig::from_args(["--fullscreen"]).is_err());
        assert!(SampleConfig::from_args(["--vsync", "--no-vsync"]).is_err());
    }
}
