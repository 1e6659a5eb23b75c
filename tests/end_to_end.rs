// Full boot-to-userland scenarios. These need a built disk image and a
// QEMU instance to actually run the kernel binary against, which this
// workspace's `cargo test` harness doesn't set up, so each is `#[ignore]`d
// and stands as a record of the behavior a real run must exhibit.

#[test]
#[ignore]
fn reads_back_a_file_written_to_the_disk_image() {
    // Disk image contains HELLO.TXT = "hello\n"; booted program opens
    // "0:/HELLO.TXT" for read, reads 6 bytes, and they equal "hello\n".
}

#[test]
#[ignore]
fn two_mallocs_keep_disjoint_and_intact_contents() {
    // malloc(128) twice, fill first with 0xAA and second with 0xBB,
    // read both back unmodified, then free both without panicking.
}

#[test]
#[ignore]
fn invoke_system_command_delivers_argv_to_the_child() {
    // invoke_system_command(["0:/blank.elf", "Testing!"]) followed by
    // the child calling print(); VGA buffer shows "Testing!\n" at the
    // cursor afterward.
}

#[test]
#[ignore]
fn cooperative_switch_alternates_between_two_loaded_tasks() {
    // Load two instances of blank.elf with "Testing!" and "Abc!"; after
    // each one exits and the next is scheduled, the arguments struct
    // each process observes matches what it was loaded with.
}

#[test]
#[ignore]
fn path_parse_rejects_a_path_missing_its_disk_selector() {
    // parse("0:/a/b/c") -> disk 0, parts [a, b, c].
    // parse("/a") -> InvalidPath (no disk selector).
}

#[test]
#[ignore]
fn paging_map_range_makes_a_physical_page_visible_at_a_new_virtual_address() {
    // paging_new_4gb(P|W|U), map_range(dir, 0x400000, 0x800000, 1, P|W|U),
    // switch to dir, write 0xDEADBEEF at 0x400000, and the same pattern
    // reads back from physical 0x800000.
}
