fn main() {
    if let Err(err) = shotdrop_lib::run() {
        eprintln!("shotdrop: {err:#}");
        std::process::exit(1);
    }
}
