use regex::Regex;
use screen_capture::{OutputRegion, Rectangle, ScreenInfoError};
use std::process::Command;

const CONNECTED_OUTPUT: &str = r"^(\S+) connected (?:primary )?(\d+)x(\d+)\+(-?\d+)\+(-?\d+)";

pub fn available_outputs(display: Option<&str>) -> Result<Vec<OutputRegion>, ScreenInfoError> {
    let outputs = cmd_get(display)?;

    if outputs.is_empty() {
        return Err(ScreenInfoError::Other(
            "can not find connected output".to_string(),
        ));
    }

    for output in outputs.iter() {
        log::debug!("found output {} at {}", output.name, output.region);
    }

    Ok(outputs)
}

fn cmd_get(display: Option<&str>) -> Result<Vec<OutputRegion>, ScreenInfoError> {
    let exe = "xrandr";
    if which::which(exe).is_err() {
        return Err(ScreenInfoError::Command("xrandr no found".to_string()));
    }

    let mut cmd = Command::new(exe);
    if let Some(display) = display {
        cmd.args(["--display", display]);
    }

    let output = cmd
        .arg("--query")
        .output()
        .map_err(|e| ScreenInfoError::Command(format!("run xrandr failed: {}", e)))?;

    if !output.status.success() {
        return Err(ScreenInfoError::Command(format!(
            "run xrandr failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    parse_xrandr_query(&String::from_utf8_lossy(&output.stdout))
}

/// Connected outputs that are driven by a display controller, in `xrandr` order.
///
/// Outputs that are connected but switched off carry no geometry and are skipped.
pub fn parse_xrandr_query(text: &str) -> Result<Vec<OutputRegion>, ScreenInfoError> {
    let re = Regex::new(CONNECTED_OUTPUT)
        .map_err(|e| ScreenInfoError::Other(format!("build regex failed: {e}")))?;

    let mut outputs = vec![];
    for caps in text.lines().filter_map(|line| re.captures(line)) {
        let num = |i: usize| -> Result<i64, ScreenInfoError> {
            caps[i]
                .parse::<i64>()
                .map_err(|e| ScreenInfoError::Other(format!("parse `{}` failed: {e}", &caps[i])))
        };

        let (width, height, x, y) = (num(2)?, num(3)?, num(4)?, num(5)?);
        let region = Rectangle::new(
            i32::try_from(x).map_err(|e| ScreenInfoError::Other(e.to_string()))?,
            i32::try_from(y).map_err(|e| ScreenInfoError::Other(e.to_string()))?,
            u32::try_from(width).map_err(|e| ScreenInfoError::Other(e.to_string()))?,
            u32::try_from(height).map_err(|e| ScreenInfoError::Other(e.to_string()))?,
        );

        if region.is_empty() {
            continue;
        }

        outputs.push(OutputRegion::new(&caps[1], region));
    }

    Ok(outputs)
}
