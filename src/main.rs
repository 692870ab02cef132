use event_status::core::terminal;

#[tokio::main]
async fn main() {
    if let Err(e) = event_status::cli::run_main().await {
        terminal::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
    terminal::print_goodbye();
}
