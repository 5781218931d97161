use donor_engine_api::run;

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("donor engine error: {err}");
        std::process::exit(1);
    }
}
