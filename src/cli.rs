use crate::config::EngineConfigOverrides;
use crate::engine::DemoOptions;
use anyhow::{anyhow, bail, Context, Result};
use std::env;
use std::path::PathBuf;

const USAGE: &str = "Supported flags: --config <file>, --model <file.gltf>, --frames <n>, --ups <n>, --fps <n>, --vsync <on|off>.";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CliOverrides {
    config: Option<PathBuf>,
    model: Option<PathBuf>,
    frames: Option<u64>,
    ups: Option<u32>,
    fps: Option<u32>,
    vsync: Option<bool>,
}

impl CliOverrides {
    pub fn parse_from_env() -> Result<Self> {
        Self::parse(env::args())
    }

    pub fn parse<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut overrides = CliOverrides::default();
        let mut iter = args.into_iter();
        let _ = iter.next(); // skip program name if present
        while let Some(raw_flag) = iter.next() {
            let flag = raw_flag.as_ref();
            let Some(key) = flag.strip_prefix("--") else {
                bail!("Unexpected argument '{flag}'. {USAGE}");
            };
            let value =
                iter.next().ok_or_else(|| anyhow!("Expected a value after '{flag}'"))?.as_ref().to_string();
            match key {
                "config" => overrides.config = Some(PathBuf::from(value)),
                "model" => overrides.model = Some(PathBuf::from(value)),
                "frames" => {
                    overrides.frames =
                        Some(value.parse::<u64>().with_context(|| format!("Invalid frame count '{value}'"))?);
                }
                "ups" => {
                    let ups = value.parse::<u32>().with_context(|| format!("Invalid ups '{value}'"))?;
                    if ups == 0 {
                        bail!("--ups must be at least 1");
                    }
                    overrides.ups = Some(ups);
                }
                "fps" => {
                    overrides.fps = Some(value.parse::<u32>().with_context(|| format!("Invalid fps '{value}'"))?);
                }
                "vsync" => {
                    overrides.vsync = Some(parse_bool_flag("vsync", &value)?);
                }
                _ => bail!("Unknown flag '{flag}'. {USAGE}"),
            }
        }
        Ok(overrides)
    }

    pub fn config_overrides(&self) -> EngineConfigOverrides {
        EngineConfigOverrides {
            vsync: self.vsync,
            target_ups: self.ups,
            target_fps: self.fps,
            ..EngineConfigOverrides::default()
        }
    }

    pub fn into_demo_options(self) -> DemoOptions {
        let overrides = self.config_overrides();
        DemoOptions { config_path: self.config, model_path: self.model, frames: self.frames, overrides }
    }

    #[cfg(test)]
    pub fn as_tuple(&self) -> (Option<u64>, Option<u32>, Option<u32>, Option<bool>) {
        (self.frames, self.ups, self.fps, self.vsync)
    }
}

fn parse_bool_flag(flag: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Ok(true),
        "0" | "false" | "off" | "no" => Ok(false),
        other => bail!("Invalid {flag} value '{other}'. Use on/off or true/false."),
    }
}
