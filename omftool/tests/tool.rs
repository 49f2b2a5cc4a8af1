use omf80::module::{ExternalFixup, Segment, CODE_SEGMENT};
use omf80::records::NamedOffset;
use omf80::{ContentDef, Module, Record};
use std::collections::BTreeMap;
use std::path::Path;
use std::process::Command;

const TMP_DIR: &str = env!("CARGO_TARGET_TMPDIR");
const OMFTOOL: &str = env!("CARGO_BIN_EXE_omftool");

#[track_caller]
fn run_command(mut cmd: Command) {
    let mut s = String::new();
    s.push_str(cmd.get_program().to_str().unwrap());
    for arg in cmd.get_args() {
        s.push(' ');
        s.push_str(arg.to_str().unwrap());
    }

    println!("Running: {s}");

    let status = cmd.status().expect("Failed to execute command");

    if !status.success() {
        panic!("Command failed: {}", status.code().unwrap());
    }

    println!();
}

fn write_object(path: &Path, module: &Module) {
    let mut records = module.to_records().unwrap();
    records.push(Record::EndOfFile);
    std::fs::write(path, omf80::write_records(&records)).unwrap();
}

fn caller_module() -> Module {
    Module {
        name: "MAIN".into(),
        is_main: true,
        segments: BTreeMap::from([(
            CODE_SEGMENT,
            Segment {
                length: 4,
                align: 0,
            },
        )]),
        external_names: vec!["FOO".into()],
        content_definitions: vec![ContentDef {
            seg_id: CODE_SEGMENT,
            offset: 0,
            data: vec![0xcd, 0x00, 0x00, 0x00],
            external: BTreeMap::from([(
                3u8,
                vec![ExternalFixup {
                    name: "FOO".into(),
                    offset: 1,
                }],
            )]),
            ..ContentDef::default()
        }],
        ..Module::default()
    }
}

fn callee_module() -> Module {
    Module {
        name: "SUB".into(),
        segments: BTreeMap::from([(
            CODE_SEGMENT,
            Segment {
                length: 1,
                align: 0,
            },
        )]),
        public_declarations: BTreeMap::from([(
            CODE_SEGMENT,
            vec![NamedOffset {
                offset: 0,
                name: "FOO".into(),
            }],
        )]),
        content_definitions: vec![ContentDef {
            seg_id: CODE_SEGMENT,
            offset: 0,
            data: vec![0xc9],
            ..ContentDef::default()
        }],
        ..Module::default()
    }
}

#[test]
fn link_then_make_image() {
    let dir = Path::new(TMP_DIR).join("link_then_make_image");
    _ = std::fs::create_dir_all(&dir);

    let a_path = dir.join("main.obj");
    let b_path = dir.join("sub.obj");
    let linked_path = dir.join("out.obj");
    let image_path = dir.join("out.bin");

    write_object(&a_path, &caller_module());
    write_object(&b_path, &callee_module());

    // link the two modules into one object file
    {
        let mut cmd = Command::new(OMFTOOL);
        cmd.arg("link");
        cmd.arg(&a_path);
        cmd.arg(&b_path);
        cmd.arg("-o");
        cmd.arg(&linked_path);
        run_command(cmd);
    }

    // the linked object reads back as a module with the call resolved
    {
        let data = std::fs::read(&linked_path).unwrap();
        let mut records = omf80::read_records(&data).unwrap();
        assert_eq!(records.pop(), Some(Record::EndOfFile));
        let module = Module::from_records(&records).unwrap();
        assert_eq!(module.name, "MAIN");
        assert!(module.is_main);
        assert_eq!(module.segments[&CODE_SEGMENT].length, 5);
        assert_eq!(
            module.content_definitions[0].data,
            vec![0xcd, 0x04, 0x00, 0x00]
        );
    }

    // convert the linked object to an image at 0x100
    {
        let mut cmd = Command::new(OMFTOOL);
        cmd.arg("mkbin");
        cmd.arg(&linked_path);
        cmd.arg("--code");
        cmd.arg("0x100");
        cmd.arg("--stack");
        cmd.arg("0");
        cmd.arg("-o");
        cmd.arg(&image_path);
        run_command(cmd);
    }

    let image = std::fs::read(&image_path).unwrap();
    assert_eq!(image, vec![0xcd, 0x04, 0x01, 0x00, 0xc9]);

    // linkbin produces the same image in one step, with an h-suffixed address
    let direct_path = dir.join("direct.bin");
    {
        let mut cmd = Command::new(OMFTOOL);
        cmd.arg("linkbin");
        cmd.arg(&a_path);
        cmd.arg(&b_path);
        cmd.arg("--code");
        cmd.arg("100h");
        cmd.arg("--stack");
        cmd.arg("0");
        cmd.arg("-o");
        cmd.arg(&direct_path);
        run_command(cmd);
    }
    assert_eq!(std::fs::read(&direct_path).unwrap(), image);

    // the dump listing runs clean over the linked object
    {
        let mut cmd = Command::new(OMFTOOL);
        cmd.arg("dump");
        cmd.arg(&linked_path);
        run_command(cmd);
    }
}

#[test]
fn unresolved_external_exits_nonzero() {
    let dir = Path::new(TMP_DIR).join("unresolved_external");
    _ = std::fs::create_dir_all(&dir);

    let a_path = dir.join("main.obj");
    write_object(&a_path, &caller_module());

    let mut cmd = Command::new(OMFTOOL);
    cmd.arg("link");
    cmd.arg(&a_path);
    cmd.arg("-o");
    cmd.arg(dir.join("out.obj"));
    let status = cmd.status().expect("Failed to execute command");
    assert!(!status.success());
}

#[test]
fn missing_end_of_file_is_rejected() {
    let dir = Path::new(TMP_DIR).join("missing_end_of_file");
    _ = std::fs::create_dir_all(&dir);

    let a_path = dir.join("main.obj");
    let records = caller_module().to_records().unwrap();
    std::fs::write(&a_path, omf80::write_records(&records)).unwrap();

    let mut cmd = Command::new(OMFTOOL);
    cmd.arg("dump");
    cmd.arg(&a_path);
    run_command(cmd); // dump does not require the terminator

    let mut cmd = Command::new(OMFTOOL);
    cmd.arg("link");
    cmd.arg(&a_path);
    cmd.arg("-o");
    cmd.arg(dir.join("out.obj"));
    let status = cmd.status().expect("Failed to execute command");
    assert!(!status.success());
}
