fn main() {
    let fixture = tests::generate_fixture(&mut rand::thread_rng());
    println!(
        "{}",
        serde_json::to_string_pretty(&fixture).expect("serializing fixture")
    );
}
