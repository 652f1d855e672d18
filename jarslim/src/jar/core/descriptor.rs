use std::str::FromStr;

use jdescriptor::MethodDescriptor;

use crate::jar::core::remap::{RemapError, TypeRemapper};

/// Rewrites every class name inside a field or method descriptor, or inside
/// an array class name such as `[Lcom/acme/Foo;`.
pub fn remap_descriptor<R: TypeRemapper + ?Sized>(
    descriptor: &str,
    remapper: &mut R,
) -> Result<String, RemapError> {
    let bad = || RemapError::BadDescriptor(descriptor.to_owned());
    // `V` is only legal on its own, as an annotation's `void.class` value.
    if descriptor != "V" {
        let method = if descriptor.starts_with('(') {
            MethodDescriptor::from_str(descriptor)
        } else {
            MethodDescriptor::from_str(&format!("({descriptor})V"))
        }
        .map_err(|_| bad())?;
        if !descriptor.starts_with('(') && method.parameter_types().len() != 1 {
            return Err(bad());
        }
    }

    // The grammar is checked, so every `L` opens a class name up to its `;`.
    let mut out = String::with_capacity(descriptor.len());
    let mut rest = descriptor;
    while let Some(start) = rest.find('L') {
        out.push_str(&rest[..=start]);
        let end = rest[start..].find(';').ok_or_else(bad)? + start;
        out.push_str(&remapper.map_type(&rest[start + 1..end]));
        out.push(';');
        rest = &rest[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

/// Rewrites every class name inside a class, method or field signature.
pub fn remap_signature<R: TypeRemapper + ?Sized>(
    signature: &str,
    remapper: &mut R,
) -> Result<String, RemapError> {
    SignatureRemapper {
        signature,
        bytes: signature.as_bytes(),
        pos: 0,
        out: String::with_capacity(signature.len()),
        remapper,
    }
    .run()
}

struct SignatureRemapper<'s, 'r, R: ?Sized> {
    signature: &'s str,
    bytes: &'s [u8],
    pos: usize,
    out: String,
    remapper: &'r mut R,
}

impl<R: TypeRemapper + ?Sized> SignatureRemapper<'_, '_, R> {
    fn bad(&self) -> RemapError {
        RemapError::BadSignature(self.signature.to_owned())
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn copy(&mut self, expected: u8) -> Result<(), RemapError> {
        if self.peek() != Some(expected) {
            return Err(self.bad());
        }
        self.out.push(expected as char);
        self.pos += 1;
        Ok(())
    }

    fn identifier(&mut self) -> Result<&str, RemapError> {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if matches!(b, b'.' | b';' | b'[' | b'/' | b'<' | b'>' | b':') {
                break;
            }
            self.pos += 1;
        }
        if self.pos == start {
            return Err(self.bad());
        }
        Ok(&self.signature[start..self.pos])
    }

    fn run(mut self) -> Result<String, RemapError> {
        if self.peek() == Some(b'<') {
            self.type_parameters()?;
        }

        if self.peek() == Some(b'(') {
            self.copy(b'(')?;
            while self.peek() != Some(b')') {
                self.java_type()?;
            }
            self.copy(b')')?;
            if self.peek() == Some(b'V') {
                self.copy(b'V')?;
            } else {
                self.java_type()?;
            }
            while self.peek() == Some(b'^') {
                self.copy(b'^')?;
                self.reference_type()?;
            }
        } else {
            if self.peek().is_none() {
                return Err(self.bad());
            }
            while self.peek().is_some() {
                self.java_type()?;
            }
        }

        if self.pos != self.bytes.len() {
            return Err(self.bad());
        }
        Ok(self.out)
    }

    fn type_parameters(&mut self) -> Result<(), RemapError> {
        self.copy(b'<')?;
        loop {
            match self.peek() {
                Some(b'>') => break,
                None => return Err(self.bad()),
                Some(_) => {}
            }
            let name = self.identifier()?.to_owned();
            self.out.push_str(&name);
            self.copy(b':')?;
            if matches!(self.peek(), Some(b'L' | b'T' | b'[')) {
                self.reference_type()?;
            }
            while self.peek() == Some(b':') {
                self.copy(b':')?;
                self.reference_type()?;
            }
        }
        self.copy(b'>')
    }

    fn java_type(&mut self) -> Result<(), RemapError> {
        match self.peek() {
            Some(b @ (b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z')) => self.copy(b),
            _ => self.reference_type(),
        }
    }

    fn reference_type(&mut self) -> Result<(), RemapError> {
        match self.peek() {
            Some(b'L') => self.class_type(),
            Some(b'T') => {
                self.copy(b'T')?;
                let name = self.identifier()?.to_owned();
                self.out.push_str(&name);
                self.copy(b';')
            }
            Some(b'[') => {
                self.copy(b'[')?;
                self.java_type()
            }
            _ => Err(self.bad()),
        }
    }

    fn class_type(&mut self) -> Result<(), RemapError> {
        self.copy(b'L')?;
        let mut name = String::new();
        loop {
            name.push_str(self.identifier()?);
            if self.peek() != Some(b'/') {
                break;
            }
            name.push('/');
            self.pos += 1;
        }
        let mapped = self.remapper.map_type(&name);
        self.out.push_str(&mapped);
        if self.peek() == Some(b'<') {
            self.type_arguments()?;
        }

        while self.peek() == Some(b'.') {
            self.pos += 1;
            let inner = self.identifier()?.to_owned();
            let outer = std::mem::take(&mut name);
            name = format!("{outer}${inner}");

            let remapped_outer = format!("{}$", self.remapper.map_type(&outer));
            let remapped = self.remapper.map_type(&name);
            let start = if remapped.starts_with(&remapped_outer) {
                remapped_outer.len()
            } else {
                remapped.rfind('$').map_or(0, |idx| idx + 1)
            };
            self.out.push('.');
            self.out.push_str(&remapped[start..]);

            if self.peek() == Some(b'<') {
                self.type_arguments()?;
            }
        }
        self.copy(b';')
    }

    fn type_arguments(&mut self) -> Result<(), RemapError> {
        self.copy(b'<')?;
        loop {
            match self.peek() {
                Some(b'>') => break,
                Some(b'*') => self.copy(b'*')?,
                Some(b @ (b'+' | b'-')) => {
                    self.copy(b)?;
                    self.reference_type()?;
                }
                Some(_) => self.reference_type()?,
                None => return Err(self.bad()),
            }
        }
        self.copy(b'>')
    }
}
