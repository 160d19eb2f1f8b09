//! Writes a small cube-like mesh with several property groups and reads it
//! back in all encodings.

use std::io::{BufWriter, Cursor};

use failure::Error;

use ply_codec::{Encoding, PlyScalar, Reader, ScalarType, Writer};


fn to_bytes<T: PlyScalar>(values: &[T]) -> Vec<u8> {
    let mut out = Vec::new();
    for &v in values {
        v.extend_native(&mut out);
    }
    out
}

struct Mesh {
    positions: Vec<f32>,
    normals: Vec<f32>,
    colors: Vec<u8>,
    indices: Vec<u32>,
    texcoords: Vec<f32>,
}

fn mesh() -> Mesh {
    Mesh {
        positions: (0..36).map(|i| (i % 7) as f32 - 2.5).collect(),
        normals: (0..36).map(|i| if i % 3 == 2 { 1.0 } else { 0.0 }).collect(),
        colors: (0..48).map(|i| (i * 5) as u8).collect(),
        indices: vec![0, 1, 2, 2, 3, 0, 4, 5, 6, 6, 7, 4],
        texcoords: (0..24).map(|i| i as f32 / 24.0).collect(),
    }
}

fn write(mesh: &Mesh, encoding: Encoding) -> Result<Vec<u8>, Error> {
    let positions = to_bytes(&mesh.positions);
    let normals = to_bytes(&mesh.normals);
    let indices = to_bytes(&mesh.indices);
    let texcoords = to_bytes(&mesh.texcoords);

    let mut writer = Writer::new(encoding);
    writer.add_comment("generated by ply-codec tests");
    writer.add_properties_to_element(
        "vertex", &["x", "y", "z"], ScalarType::Float32, 36, &positions, None, 0,
    )?;
    writer.add_properties_to_element(
        "vertex", &["nx", "ny", "nz"], ScalarType::Float32, 36, &normals, None, 0,
    )?;
    writer.add_properties_to_element(
        "vertex", &["red", "green", "blue", "alpha"], ScalarType::Uint8, 48, &mesh.colors, None, 0,
    )?;
    writer.add_properties_to_element(
        "face", &["vertex_indices"], ScalarType::Uint32, 12, &indices, Some(ScalarType::Uint16), 3,
    )?;
    writer.add_properties_to_element(
        "face", &["texcoord"], ScalarType::Float32, 24, &texcoords, Some(ScalarType::Uint16), 6,
    )?;

    let mut out = BufWriter::new(Vec::new());
    writer.write(&mut out)?;
    Ok(out.into_inner()?)
}

#[test]
fn all_encodings() -> Result<(), Error> {
    let mesh = mesh();

    for &encoding in &[Encoding::Ascii, Encoding::BinaryLittleEndian, Encoding::BinaryBigEndian] {
        let file = write(&mesh, encoding)?;
        let mut reader = Reader::new(Cursor::new(file))?;

        assert_eq!(reader.comments(), ["generated by ply-codec tests"]);
        let names = reader.elements().iter().map(|e| (e.name(), e.count())).collect::<Vec<_>>();
        assert_eq!(names, [("vertex", 12), ("face", 4)]);
        assert_eq!(reader.elements()[0].properties().len(), 10);

        let positions = reader.request_properties_from_element("vertex", &["x", "y", "z"])?;
        let normals = reader.request_properties_from_element("vertex", &["nx", "ny", "nz"])?;
        let colors = reader.request_properties_from_element("vertex", &["red", "green", "blue", "alpha"])?;
        let indices = reader.request_properties_from_element("face", &["vertex_indices"])?;
        let texcoords = reader.request_properties_from_element("face", &["texcoord"])?;
        let result = reader.read()?;

        assert_eq!(result.get(positions).unwrap().to_vec::<f32>()?, mesh.positions);
        assert_eq!(result.get(normals).unwrap().to_vec::<f32>()?, mesh.normals);
        assert_eq!(result.get(colors).unwrap().data(), &mesh.colors[..]);

        let indices = result.get(indices).unwrap();
        assert_eq!(indices.count(), 12);
        assert!(indices.is_list());
        assert_eq!(indices.to_vec::<u32>()?, mesh.indices);

        let texcoords = result.get(texcoords).unwrap();
        assert_eq!(texcoords.count(), 24);
        assert_eq!(texcoords.list_lengths(), [6, 6, 6, 6]);
        assert_eq!(texcoords.to_vec::<f32>()?, mesh.texcoords);
    }

    Ok(())
}

#[test]
fn requested_order_is_kept() -> Result<(), Error> {
    let file = write(&mesh(), Encoding::BinaryLittleEndian)?;
    let mut reader = Reader::new(&file[..])?;

    let zyx = reader.request_properties_from_element("vertex", &["z", "y", "x"])?;
    let result = reader.read()?;
    let zyx = result.get(zyx).unwrap().to_vec::<f32>()?;

    let mesh = mesh();
    let expected = mesh.positions
        .chunks(3)
        .flat_map(|p| vec![p[2], p[1], p[0]])
        .collect::<Vec<_>>();
    assert_eq!(zyx, expected);

    Ok(())
}
