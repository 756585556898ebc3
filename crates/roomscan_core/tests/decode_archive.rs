//! End-to-end decoding of in-memory USDZ archives.

use std::io::{Cursor, Write};

use roomscan_core::usd::TextureHandle;
use roomscan_core::{decode, DecodeError, Diagnostic, UsdzDecoder, DecodeOptions, VisibilityFilter};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn build_usdz(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    for (name, data) in entries {
        writer.start_file(*name, options).unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

fn png_bytes() -> Vec<u8> {
    let mut cursor = Cursor::new(Vec::new());
    image::DynamicImage::new_rgba8(2, 2)
        .write_to(&mut cursor, image::ImageOutputFormat::Png)
        .unwrap();
    cursor.into_inner()
}

const ENTRY: &str = r#"#usda 1.0
(
    defaultPrim = "Room"
)

def Xform "Room"
{
    def Xform "Door_0" (
        prepend references = @./parts/door.usda@
    )
    {
        double3 xformOp:translate = (1, 0, 0)
    }

    def Mesh "Floor0"
    {
        int[] faceVertexCounts = [4]
        int[] faceVertexIndices = [0, 1, 2, 3]
        point3f[] points = [(0, 0, 0), (4, 0, 0), (4, 0, 4), (0, 0, 4)]
        texCoord2f[] primvars:st = [(0, 0), (1, 0), (1, 1), (0, 1)]
        rel material:binding = </Room/Looks/FloorMat>
    }

    def Xform "Missing"
    {
        prepend references = @./parts/gone.usda@
    }

    def Scope "Looks"
    {
        def Material "FloorMat"
        {
            token outputs:surface.connect = </Room/Looks/FloorMat/Surface.outputs:surface>

            def Shader "Surface"
            {
                color3f inputs:diffuseColor.connect = </Room/Looks/FloorMat/Tex.outputs:rgb>
            }

            def Shader "Tex"
            {
                asset inputs:file = @textures/floor.png@
                token inputs:wrapS = "repeat"
                token inputs:wrapT = "repeat"
            }
        }
    }
}
"#;

const DOOR: &str = r#"#usda 1.0

def Mesh "Leaf"
{
    int[] faceVertexCounts = [4]
    int[] faceVertexIndices = [0, 1, 2, 3]
    point3f[] points = [(0, 0, 0), (1, 0, 0), (1, 2, 0), (0, 2, 0)]
    rel material:binding = </Leaf/Looks/Paint>

    def Scope "Looks"
    {
        def Material "Paint"
        {
            token outputs:surface.connect = </Leaf/Looks/Paint/S.outputs:surface>
            def Shader "S"
            {
                color3f inputs:diffuseColor = (0.3, 0.2, 0.1)
            }
        }
    }
}

def Xform "Handle" (
    references = @../parts/door.usda@
)
{
}
"#;

fn room_archive() -> Vec<u8> {
    let png = png_bytes();
    build_usdz(&[
        ("Room.usda", ENTRY.as_bytes()),
        ("parts/door.usda", DOOR.as_bytes()),
        ("textures/floor.png", &png),
    ])
}

#[test]
fn test_archive_with_references_and_textures() {
    init_logging();
    let scene = decode(&room_archive()).unwrap();

    assert_eq!(scene.entry.as_deref(), Some("Room.usda"));
    assert_eq!(scene.stage.default_prim.as_deref(), Some("Room"));
    assert_eq!(scene.assets.len(), 3);

    // Referenced layer is spliced under the referencing Xform
    let door = scene.root.find("Door_0").unwrap();
    assert!(door.tags.is_door);
    let leaf = door.children.iter().find(|c| c.name == "Leaf").unwrap();
    assert!(leaf.tags.is_door);
    assert!(leaf.tags.is_structure);
    assert!(leaf.mesh.as_ref().unwrap().material.is_glass());

    let floor = scene.root.find("Floor0").unwrap();
    let part = floor.mesh.as_ref().unwrap();
    assert_eq!(part.buffers.vertex_count(), 6);
    assert_eq!(part.buffers.uvs.as_ref().map(Vec::len), Some(6));
    let texture = part.material.diffuse_texture.as_ref().unwrap();
    assert_eq!(texture.asset_path, "textures/floor.png");
    assert!(matches!(texture.handle, Some(TextureHandle::Embedded { .. })));
}

#[test]
fn test_missing_and_cyclic_references_are_reported() {
    let scene = decode(&room_archive()).unwrap();
    let diagnostics = &scene.report.diagnostics;

    assert!(diagnostics.contains(&Diagnostic::UnresolvedReference {
        path: "parts/gone.usda".into()
    }));
    assert!(diagnostics.contains(&Diagnostic::ReferenceCycle {
        path: "parts/door.usda".into()
    }));

    // The rest of the scene survives
    let missing = scene.root.find("Missing").unwrap();
    assert!(missing.children.is_empty());
    assert_eq!(scene.root.draw_list(VisibilityFilter::All).len(), 2);
}

#[test]
fn test_texture_hook_handles() {
    let decoder = UsdzDecoder::new(DecodeOptions::default())
        .with_texture_hook(|path, bytes| TextureHandle::Host(format!("tex://{}#{}", path, bytes.len())));
    let scene = decoder.decode(&room_archive()).unwrap();

    let floor = scene.root.find("Floor0").unwrap();
    let texture = floor.mesh.as_ref().unwrap().material.diffuse_texture.as_ref().unwrap();
    match texture.handle.as_ref() {
        Some(TextureHandle::Host(id)) => assert!(id.starts_with("tex://textures/floor.png#")),
        other => panic!("unexpected handle {:?}", other),
    }
}

#[test]
fn test_crate_entry_is_unsupported() {
    let bytes = build_usdz(&[
        ("Room.usdc", b"PXR-USDC\x00\x08\x00\x00\x00\x00"),
        ("textures/a.png", &png_bytes()),
    ]);
    let err = decode(&bytes).unwrap_err();
    assert!(matches!(
        err,
        DecodeError::UnsupportedFormat { path: Some(ref p) } if p == "Room.usdc"
    ));
}

#[test]
fn test_archive_without_layers() {
    let bytes = build_usdz(&[("textures/a.png", &png_bytes())]);
    assert!(matches!(decode(&bytes).unwrap_err(), DecodeError::MissingEntryPoint));
}

#[test]
fn test_truncated_archive_is_an_error() {
    let mut bytes = room_archive();
    bytes.truncate(64);
    assert!(matches!(decode(&bytes).unwrap_err(), DecodeError::Archive(_)));
}

#[test]
fn test_decoding_twice_gives_equal_scenes() {
    let bytes = room_archive();
    let a = decode(&bytes).unwrap();
    let b = decode(&bytes).unwrap();
    assert_eq!(a.root, b.root);
    assert_eq!(a.report, b.report);
}

fn mesh_layer(name: &str, reference: Option<&str>) -> String {
    let mut layer = format!(
        "#usda 1.0\n\ndef Mesh \"{}\"\n{{\n    int[] faceVertexCounts = [3]\n    int[] faceVertexIndices = [0, 1, 2]\n    point3f[] points = [(0, 0, 0), (1, 0, 0), (0, 1, 0)]\n}}\n",
        name
    );
    if let Some(path) = reference {
        layer.push_str(&format!("\ndef Xform \"Next\" (\n    references = @{}@\n)\n{{\n}}\n", path));
    }
    layer
}

fn reference_chain_archive() -> Vec<u8> {
    let room = mesh_layer("RoomMesh", Some("a.usda"));
    let a = mesh_layer("AMesh", Some("b.usda"));
    let b = mesh_layer("BMesh", None);
    build_usdz(&[
        ("Room.usda", room.as_bytes()),
        ("a.usda", a.as_bytes()),
        ("b.usda", b.as_bytes()),
    ])
}

#[test]
fn test_reference_chain_depth_counts_entry_layer() {
    let bytes = reference_chain_archive();

    let options = DecodeOptions {
        max_reference_depth: 1,
        ..Default::default()
    };
    let scene = UsdzDecoder::new(options).decode(&bytes).unwrap();
    assert!(scene.root.find("RoomMesh").is_some());
    assert!(scene.root.find("AMesh").is_none());
    assert_eq!(
        scene.report.diagnostics,
        vec![Diagnostic::DepthLimit {
            prim: "a.usda".into(),
            limit: 1
        }]
    );

    let options = DecodeOptions {
        max_reference_depth: 2,
        ..Default::default()
    };
    let scene = UsdzDecoder::new(options).decode(&bytes).unwrap();
    assert!(scene.root.find("AMesh").is_some());
    assert!(scene.root.find("BMesh").is_none());
    assert_eq!(
        scene.report.diagnostics,
        vec![Diagnostic::DepthLimit {
            prim: "b.usda".into(),
            limit: 2
        }]
    );

    let scene = decode(&bytes).unwrap();
    assert!(scene.root.find("BMesh").is_some());
    assert!(scene.report.is_clean());
}

