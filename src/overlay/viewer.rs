use anyhow::{Context, Result};
use std::path::Path;
use std::process::Command;

/// Hands the image to `program`, or the desktop's default viewer, without
/// waiting for it.
pub fn open_in_viewer(path: &Path, program: Option<&str>) -> Result<()> {
    let mut command = match program {
        Some(program) => {
            let mut command = Command::new(program);
            command.arg(path);
            command
        }
        None => viewer_command(path),
    };
    command
        .spawn()
        .with_context(|| format!("failed to open image viewer for {}", path.display()))?;
    Ok(())
}

#[cfg(target_os = "macos")]
fn viewer_command(path: &Path) -> Command {
    let mut command = Command::new("open");
    command.arg(path);
    command
}

#[cfg(target_os = "windows")]
fn viewer_command(path: &Path) -> Command {
    let mut command = Command::new("cmd");
    command.args(["/C", "start", ""]).arg(path);
    command
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn viewer_command(path: &Path) -> Command {
    let mut command = Command::new("xdg-open");
    command.arg(path);
    command
}
