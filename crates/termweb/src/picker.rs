//! C11 support — native OS file/directory picker, invoked from the virtual
//! FS bridge's `__TERMWEB_PICKER__` marker. Prefers desktop-environment
//! CLI tools over the portal so the dialog matches the user's DE; falls
//! back to `rfd` (XDG portal / native dialog) when none are present.

use std::path::PathBuf;

use crate::error::PickerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickerKind {
    File,
    Folder,
}

fn normalize_title(title: &str) -> String {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        "Select".to_string()
    } else {
        trimmed.replace(['\r', '\n'], " ")
    }
}

#[cfg(unix)]
fn has_gui_env() -> bool {
    let has_display = std::env::var("DISPLAY").ok().is_some_and(|v| !v.trim().is_empty());
    let has_wayland = std::env::var("WAYLAND_DISPLAY").ok().is_some_and(|v| !v.trim().is_empty());
    has_display || has_wayland
}

#[cfg(unix)]
fn xdg_current_desktop() -> String {
    std::env::var("XDG_CURRENT_DESKTOP").unwrap_or_default().trim().to_string()
}

#[cfg(unix)]
fn command_exists(command: &str) -> bool {
    which::which(command).is_ok()
}

#[cfg(unix)]
fn run_picker_command(command: &str, args: &[String]) -> Result<Option<PathBuf>, PickerError> {
    let output = std::process::Command::new(command)
        .args(args)
        .output()
        .map_err(|e| PickerError::CommandFailed(format!("failed to run `{command}`: {e}")))?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let selected = stdout.trim();
    if output.status.success() {
        if selected.is_empty() {
            Ok(None)
        } else {
            Ok(Some(PathBuf::from(selected)))
        }
    } else if output.status.code() == Some(1) && selected.is_empty() {
        Ok(None)
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(PickerError::CommandFailed(format!(
            "`{command}` failed: {}",
            stderr.trim().replace('\n', " ")
        )))
    }
}

#[cfg(unix)]
fn pick_via_de_cascade(kind: PickerKind, title: &str) -> Result<Option<PathBuf>, PickerError> {
    if !has_gui_env() {
        return Err(PickerError::NoDisplay);
    }

    let desktop = xdg_current_desktop().to_ascii_lowercase();
    let backends: &[&str] = if desktop.contains("kde") {
        &["kdialog", "zenity", "qarma", "yad"]
    } else {
        &["zenity", "kdialog", "qarma", "yad"]
    };

    for &backend in backends {
        if !command_exists(backend) {
            continue;
        }
        let result = match backend {
            "zenity" | "qarma" | "yad" => {
                let mut args = vec!["--file-selection".to_string(), "--title".to_string(), title.to_string()];
                if kind == PickerKind::Folder {
                    args.push("--directory".to_string());
                }
                run_picker_command(backend, &args)
            }
            "kdialog" => {
                let args = match kind {
                    PickerKind::File => vec!["--getopenfilename".to_string(), "--title".to_string(), title.to_string()],
                    PickerKind::Folder => {
                        vec!["--getexistingdirectory".to_string(), "--title".to_string(), title.to_string()]
                    }
                };
                run_picker_command(backend, &args)
            }
            _ => continue,
        };

        match result {
            Ok(Some(path)) => return Ok(Some(path)),
            Ok(None) => return Ok(None),
            Err(_) => continue,
        }
    }

    pick_via_rfd(kind, title)
}

fn pick_via_rfd(kind: PickerKind, title: &str) -> Result<Option<PathBuf>, PickerError> {
    let dialog = rfd::FileDialog::new().set_title(title);
    Ok(match kind {
        PickerKind::File => dialog.pick_file(),
        PickerKind::Folder => dialog.pick_folder(),
    })
}

pub fn pick_path(kind: PickerKind, title: &str) -> Result<Option<PathBuf>, PickerError> {
    let title = normalize_title(title);

    #[cfg(unix)]
    {
        pick_via_de_cascade(kind, &title)
    }

    #[cfg(not(unix))]
    {
        pick_via_rfd(kind, &title)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_normalization_strips_newlines_and_empties() {
        assert_eq!(normalize_title("  my title  "), "my title");
        assert_eq!(normalize_title(""), "Select");
        assert_eq!(normalize_title("a\nb"), "a b");
    }
}
