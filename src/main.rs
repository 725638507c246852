mod cli;

fn main() {
    let args = <cli::Args as clap::Parser>::parse();
    args.run();
}
