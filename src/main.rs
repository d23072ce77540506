fn main() {
    fmsh_lib::run()
}
