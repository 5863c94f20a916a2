fn main() {
    readpoint_lib::run()
}
