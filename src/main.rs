fn main() {
    if let Err(e) = work_recall_lib::run() {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
