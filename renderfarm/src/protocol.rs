//! Command arguments on the wire
//!
//! [`Request::read`] is the worker side, [`write_call`] the master side.
//! Both follow the argument shapes of [`CommandKind::arg_shape`].

use std::{
    io::{BufRead, Write},
    path::Path,
};

use log::debug;
use nalgebra::{Matrix4, Point3, Vector3};

use crate::{
    command::{ArgShape, CommandKind, TEXTURE_FILE_PARAMS},
    error::{FarmError, Result},
    relay::{receive_file, send_file, TempArena},
    scene::{BlockKind, EntityKind, NamedKind, SceneCall},
    wire::{
        parse::{parse_floats, parse_motion_instance},
        read_line, ParamKind, ParamSet, ParamValue,
    },
};

/// Decoded command
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Connect,
    Disconnect(String),
    GetFilm(String),
    Init,
    WorldEnd,
    Scene(SceneCall),
}

impl Request {
    /// Read arguments of `kind` from the stream
    ///
    /// Files attached to the command are stored in `arena` and the matching
    /// parameters rewritten to the local paths.
    pub fn read<R: BufRead>(
        kind: CommandKind,
        reader: &mut R,
        arena: Option<&mut TempArena>,
    ) -> Result<Request> {
        let name = kind.name();
        let request = match kind.arg_shape() {
            ArgShape::Bare => match kind {
                CommandKind::Connect => Request::Connect,
                CommandKind::Init => Request::Init,
                CommandKind::WorldEnd => Request::WorldEnd,
                _ => {
                    let block = BlockKind::from_command(kind)
                        .ok_or_else(|| FarmError::UnknownCommand(name.to_owned()))?;
                    Request::Scene(SceneCall::Block(block))
                }
            },
            ArgShape::SessionId => {
                let sid = read_line(reader)?.trim().to_owned();
                match kind {
                    CommandKind::Disconnect => Request::Disconnect(sid),
                    _ => Request::GetFilm(sid),
                }
            }
            ArgShape::Floats(_) => Request::Scene(read_float_call(kind, reader)?),
            ArgShape::Name => {
                let value = read_line(reader)?;
                let named = NamedKind::from_command(kind)
                    .ok_or_else(|| FarmError::UnknownCommand(name.to_owned()))?;
                Request::Scene(SceneCall::Named(named, value))
            }
            ArgShape::Entity(file_params) => {
                let type_name = arg_line(reader)?;
                let mut params = ParamSet::read_from(reader)?;
                receive_files(reader, arena, &mut params, file_params)?;
                let type_name = type_name?;
                let kind = EntityKind::from_command(kind)
                    .ok_or_else(|| FarmError::UnknownCommand(name.to_owned()))?;
                Request::Scene(SceneCall::Entity {
                    kind,
                    type_name,
                    params,
                })
            }
            ArgShape::Film => {
                let type_name = arg_line(reader)?;
                let params = ParamSet::read_from(reader)?;
                let type_name = type_name?;
                Request::Scene(SceneCall::Entity {
                    kind: EntityKind::Film,
                    type_name,
                    params,
                })
            }
            ArgShape::Texture => {
                let tex_name = arg_line(reader)?;
                let type_name = arg_line(reader)?;
                let texture_type = arg_line(reader)?;
                let mut params = ParamSet::read_from(reader)?;
                receive_files(reader, arena, &mut params, TEXTURE_FILE_PARAMS)?;
                let (tex_name, type_name, texture_type) = (tex_name?, type_name?, texture_type?);
                Request::Scene(SceneCall::Texture {
                    name: tex_name,
                    type_name,
                    texture_type,
                    params,
                })
            }
            ArgShape::NamedVolume => {
                let id = arg_line(reader)?;
                let volume_name = arg_line(reader)?;
                let params = ParamSet::read_from(reader)?;
                let (id, volume_name) = (id?, volume_name?);
                Request::Scene(SceneCall::MakeNamedVolume {
                    id,
                    name: volume_name,
                    params,
                })
            }
            ArgShape::Motion => {
                let args = parse_motion_instance(&read_line(reader)?)?;
                Request::Scene(SceneCall::MotionInstance {
                    name: args.name,
                    start: args.start,
                    end: args.end,
                    to_transform: args.to_transform,
                })
            }
        };
        Ok(request)
    }
}

/// Argument line of a command with more parts to follow
///
/// A malformed line comes back inside `Ok`, the caller reports it after the
/// rest of the command was consumed.
fn arg_line<R: BufRead>(reader: &mut R) -> Result<Result<String>> {
    match read_line(reader) {
        Err(e) if e.is_fatal_for_connection() => Err(e),
        line => Ok(line),
    }
}

fn read_float_call<R: BufRead>(kind: CommandKind, reader: &mut R) -> Result<SceneCall> {
    let name = kind.name();
    let line = read_line(reader)?;
    let call = match kind {
        CommandKind::Translate => SceneCall::Translate(Vector3::from(parse_floats::<3>(name, &line)?)),
        CommandKind::Scale => SceneCall::Scale(Vector3::from(parse_floats::<3>(name, &line)?)),
        CommandKind::Rotate => {
            let [angle, x, y, z] = parse_floats::<4>(name, &line)?;
            SceneCall::Rotate {
                angle,
                axis: Vector3::new(x, y, z),
            }
        }
        CommandKind::LookAt => {
            let v = parse_floats::<9>(name, &line)?;
            SceneCall::LookAt {
                eye: Point3::new(v[0], v[1], v[2]),
                target: Point3::new(v[3], v[4], v[5]),
                up: Vector3::new(v[6], v[7], v[8]),
            }
        }
        CommandKind::ConcatTransform => {
            let v = parse_floats::<16>(name, &line)?;
            SceneCall::ConcatTransform(Matrix4::from_column_slice(&v))
        }
        CommandKind::Transform => {
            let v = parse_floats::<16>(name, &line)?;
            SceneCall::Transform(Matrix4::from_column_slice(&v))
        }
        CommandKind::SetEpsilon => {
            let [min, max] = parse_floats::<2>(name, &line)?;
            SceneCall::SetEpsilon { min, max }
        }
        _ => return Err(FarmError::UnknownCommand(name.to_owned())),
    };
    Ok(call)
}

/// File parameters of `params` which the sender attaches, in wire order
pub fn attached_files<'a>(params: &'a ParamSet, file_params: &[&str]) -> Vec<(String, &'a str)> {
    file_params
        .iter()
        .filter_map(|name| match params.find(ParamKind::String, name) {
            Some(ParamValue::String(v)) if !v.is_empty() && !v[0].is_empty() => {
                Some((name.to_string(), v[0].as_str()))
            }
            _ => None,
        })
        .collect()
}

fn receive_files<R: BufRead>(
    reader: &mut R,
    mut arena: Option<&mut TempArena>,
    params: &mut ParamSet,
    file_params: &[&str],
) -> Result<()> {
    let attached: Vec<(String, String)> = attached_files(params, file_params)
        .into_iter()
        .map(|(name, original)| (name, original.to_owned()))
        .collect();

    for (param, original) in attached {
        if let Some(local) = receive_file(reader, arena.as_deref_mut(), &original)? {
            debug!("Parameter '{param}' now points at {}", local.display());
            params.add_string(&param, &local.to_string_lossy());
        }
    }
    Ok(())
}

fn write_floats<W: Write>(writer: &mut W, values: &[f32]) -> Result<()> {
    let line: Vec<String> = values.iter().map(|v| format!("{v:e}")).collect();
    writeln!(writer, "{}", line.join(" "))?;
    Ok(())
}

fn send_files<W: Write>(writer: &mut W, params: &ParamSet, file_params: &[&str]) -> Result<()> {
    for (_, path) in attached_files(params, file_params) {
        send_file(writer, Path::new(path))?;
    }
    Ok(())
}

/// Write one scene call, files referenced by its parameters included
pub fn write_call<W: Write>(writer: &mut W, call: &SceneCall) -> Result<()> {
    let kind = call.command();
    writeln!(writer, "{}", kind.name())?;
    match call {
        SceneCall::Translate(v) | SceneCall::Scale(v) => write_floats(writer, v.as_slice())?,
        SceneCall::Rotate { angle, axis } => {
            write_floats(writer, &[*angle, axis.x, axis.y, axis.z])?
        }
        SceneCall::LookAt { eye, target, up } => write_floats(
            writer,
            &[
                eye.x, eye.y, eye.z, target.x, target.y, target.z, up.x, up.y, up.z,
            ],
        )?,
        SceneCall::ConcatTransform(m) | SceneCall::Transform(m) => {
            write_floats(writer, m.as_slice())?
        }
        SceneCall::Block(_) => {}
        SceneCall::Named(_, name) => writeln!(writer, "{name}")?,
        SceneCall::Entity {
            kind: entity,
            type_name,
            params,
        } => {
            writeln!(writer, "{type_name}")?;
            params.write_to(writer)?;
            if let ArgShape::Entity(file_params) = entity.command().arg_shape() {
                send_files(writer, params, file_params)?;
            }
        }
        SceneCall::Texture {
            name,
            type_name,
            texture_type,
            params,
        } => {
            writeln!(writer, "{name}\n{type_name}\n{texture_type}")?;
            params.write_to(writer)?;
            send_files(writer, params, TEXTURE_FILE_PARAMS)?;
        }
        SceneCall::MakeNamedVolume { id, name, params } => {
            writeln!(writer, "{id}\n{name}")?;
            params.write_to(writer)?;
        }
        SceneCall::MotionInstance {
            name,
            start,
            end,
            to_transform,
        } => writeln!(writer, "{name} {start:e} {end:e} {to_transform}")?,
        SceneCall::SetEpsilon { min, max } => write_floats(writer, &[*min, *max])?,
    }
    Ok(())
}
