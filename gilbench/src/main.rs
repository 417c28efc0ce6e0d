fn main() {
    if let Err(e) = gilbench::run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
