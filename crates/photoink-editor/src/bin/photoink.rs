//! Replay a JSON edit script over a base image.
//!
//! Usage: `photoink <base-image> <script.json>`

use photoink_editor::script::open_image;
use photoink_editor::{Script, ScriptResult};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

fn run(image_path: &Path, script_path: &Path) -> ScriptResult<Vec<PathBuf>> {
    let base = open_image(image_path)?;
    let script = Script::load(script_path)?;
    let base_dir = script_path.parent().unwrap_or(Path::new("."));
    log::info!(
        "replaying {} steps over {}x{} image",
        script.steps.len(),
        base.width(),
        base.height()
    );
    script.run(base, base_dir)
}

fn main() -> ExitCode {
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let [image_path, script_path] = args.as_slice() else {
        eprintln!("usage: photoink <base-image> <script.json>");
        return ExitCode::from(2);
    };

    match run(Path::new(image_path), Path::new(script_path)) {
        Ok(saved) => {
            for path in saved {
                println!("{}", path.display());
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("{}", e);
            eprintln!("photoink: {}", e);
            ExitCode::FAILURE
        }
    }
}
