fn main() {
    if let Err(err) = csv_reshape::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
