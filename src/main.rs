fn main() {
    if let Err(err) = batch_geocoder::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
