fn main() -> anyhow::Result<()> {
    drag_overlay::run()
}
