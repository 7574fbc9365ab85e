fn main() {
    codex_switch::run_cli();
}
