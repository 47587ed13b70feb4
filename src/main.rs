fn main() {
    #[cfg(feature = "cli")]
    filebus::cli::run();

    #[cfg(not(feature = "cli"))]
    {
        eprintln!("filebus: CLI not enabled. Rebuild with `--features cli`.");
        std::process::exit(1);
    }
}
