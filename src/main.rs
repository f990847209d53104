use std::env;

/// A stray Python install must not leak into the yt-dlp child process.
const CLEARED_VARS: &[&str] = &["PYTHONHOME", "PYTHONPATH"];

/// yt-dlp prints titles in whatever encoding it is given; force UTF-8.
const FORCED_VARS: &[(&str, &str)] = &[("PYTHONIOENCODING", "utf-8"), ("PYTHONUTF8", "1")];

fn prepare_child_env() {
    for name in CLEARED_VARS {
        env::remove_var(name);
    }
    for (name, value) in FORCED_VARS {
        env::set_var(name, value);
    }

    // a managed yt-dlp in the app's bin dir shadows one on PATH
    let mut dirs = vec![clipgrab_core::fs_paths::bin_dir()];
    if let Some(path) = env::var_os("PATH") {
        dirs.extend(env::split_paths(&path));
    }
    match env::join_paths(dirs) {
        Ok(joined) => env::set_var("PATH", joined),
        Err(e) => eprintln!("PATH left unchanged: {}", e),
    }
}

fn main() {
    prepare_child_env();
    clipgrab_lib::run()
}
