fn main() {
    if let Err(e) = labscore_lib::run() {
        eprintln!("labscore: {e}");
        std::process::exit(1);
    }
}
