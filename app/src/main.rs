fn main() -> anyhow::Result<()> {
    regionrec_lib::run()
}
