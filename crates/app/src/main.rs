fn main() {
    if let Err(error) = framepair_app::run_from_env() {
        if tracing::dispatcher::has_been_set() {
            tracing::error!("{error:#}");
        } else {
            eprintln!("Error: {error:#}");
        }
        std::process::exit(1);
    }
}
