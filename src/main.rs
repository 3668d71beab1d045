fn main() {
    ca_inspect::logging::init();
    if let Err(e) = ca_inspect::cli::run() {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
