fn main() {
    #[cfg(feature = "cli")]
    puffin::cli::run();

    #[cfg(not(feature = "cli"))]
    {
        eprintln!("puffin: CLI not enabled. Rebuild with `--features cli`.");
        std::process::exit(1);
    }
}
