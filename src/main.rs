fn main() {
    if let Err(err) = mermaid_rs_canvas::run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
