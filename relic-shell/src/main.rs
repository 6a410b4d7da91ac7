//! relic-shell CLI binary
//!
//! Usage: relic-shell [model.glb] [--config viewer.json]

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut model_path = None;
    let mut config_path = None;
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => config_path = args.next(),
            "-h" | "--help" => {
                eprintln!("Usage: relic-shell [model.glb] [--config viewer.json]");
                eprintln!("Example: relic-shell ./romes_colosseum.glb");
                return;
            }
            _ => model_path = Some(arg),
        }
    }

    let mut config = match &config_path {
        Some(path) => match relic::ViewerConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error: {}: {}", path, e);
                std::process::exit(1);
            }
        },
        None => relic::ViewerConfig::default(),
    };
    if let Some(path) = model_path {
        config.model_path = path;
    }

    // Relative model paths resolve against the config file's directory
    let base_path = config_path
        .as_deref()
        .and_then(|p| std::path::Path::new(p).parent())
        .map(std::path::Path::to_path_buf);

    if let Err(e) = relic_shell::run(config, base_path) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {}
