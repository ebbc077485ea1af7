fn main() {
    if let Err(err) = checkin_lib::run() {
        eprintln!("checkin: {err:#}");
        std::process::exit(1);
    }
}
