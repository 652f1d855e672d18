use std::collections::HashMap;

use krakatau2::lib::{
    classfile::{
        attrs::{Annotation, AttrBody, Attribute, ElementValue},
        cpool::{BStr, Const},
        parse::Class,
    },
    parse_utf8,
};
use thiserror::Error;

use crate::jar::core::{
    assembly::{parse_class, reasm, ReasmError},
    descriptor::{remap_descriptor, remap_signature},
};

/// Decides what every class name referenced by a class file becomes.
///
/// Called once per distinct reference, so implementations may record the
/// references they are asked about.
pub trait TypeRemapper {
    fn map_type(&mut self, internal_name: &str) -> String;
}

#[derive(Debug, Error)]
pub enum RemapError {
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("constant pool index {index} is not a {expected} entry")]
    BadIndex { index: u16, expected: &'static str },
    #[error("constant pool entry {0} holds malformed modified UTF-8")]
    BadUtf8(u16),
    #[error("malformed type descriptor `{0}`")]
    BadDescriptor(String),
    #[error("malformed generic signature `{0}`")]
    BadSignature(String),
    #[error("constant pool is full")]
    PoolOverflow,
    #[error(transparent)]
    Reasm(#[from] ReasmError),
}

pub fn parse(bytes: &[u8]) -> Result<Class<'_>, RemapError> {
    parse_class(bytes).map_err(RemapError::Parse)
}

/// Internal name of the class itself.
pub fn class_name(class: &Class<'_>) -> Result<String, RemapError> {
    let bytes = class.cp.clsutf(class.this).ok_or(RemapError::BadIndex {
        index: class.this,
        expected: "Class",
    })?;
    parse_utf8(bytes).ok_or(RemapError::BadUtf8(class.this))
}

/// Rewrites every symbolic class reference of `class` through `remapper`.
///
/// Existing UTF-8 constants are never modified. Every use of a class name,
/// descriptor or signature whose text changes is pointed at another UTF-8
/// constant holding the new text, reusing one with the same bytes when the
/// pool has it and appending one otherwise. Anything else sharing the old
/// constant, such as string literals, annotation strings or member names,
/// keeps reading the original text.
pub fn remap_class<R: TypeRemapper + ?Sized>(
    mut class: Class<'_>,
    remapper: &mut R,
) -> Result<Vec<u8>, RemapError> {
    let plan = plan_class(&mut class, remapper)?;

    // Appended constants borrow from the plan.
    let mut class = class;
    plan.apply(&mut class)?;
    Ok(reasm(&class)?)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Role {
    InternalName,
    Descriptor,
    Signature,
}

/// Visits every index into the constant pool that names a type from outside
/// the pool: member descriptors and everything attributes carry.
trait TypeSites {
    fn site(&mut self, index: &mut u16, role: Role) -> Result<(), RemapError>;
}

#[derive(Default)]
struct RemapPlan {
    first_new: usize,
    appended: Vec<Vec<u8>>,
    by_bytes: HashMap<Vec<u8>, u16>,
    targets: HashMap<(u16, Role), u16>,
    class_roles: HashMap<u16, Role>,
}

impl RemapPlan {
    fn intern(&mut self, bytes: Vec<u8>) -> Result<u16, RemapError> {
        if let Some(index) = self.by_bytes.get(&bytes) {
            return Ok(*index);
        }
        // The pool count is a u16 one past the last usable index.
        let index = self.first_new + self.appended.len();
        if index >= u16::MAX as usize {
            return Err(RemapError::PoolOverflow);
        }
        let index = index as u16;
        self.by_bytes.insert(bytes.clone(), index);
        self.appended.push(bytes);
        Ok(index)
    }

    fn target(&self, utf8: u16, role: Role) -> u16 {
        self.targets.get(&(utf8, role)).copied().unwrap_or(utf8)
    }

    fn apply<'p>(&'p self, class: &mut Class<'p>) -> Result<(), RemapError> {
        for entry in class.cp.0.iter_mut() {
            match entry {
                Const::Class(utf8) => {
                    let role = self
                        .class_roles
                        .get(&*utf8)
                        .copied()
                        .unwrap_or(Role::InternalName);
                    *utf8 = self.target(*utf8, role);
                }
                Const::NameAndType(_, descriptor) | Const::MethodType(descriptor) => {
                    *descriptor = self.target(*descriptor, Role::Descriptor);
                }
                _ => {}
            }
        }
        class
            .cp
            .0
            .extend(self.appended.iter().map(|bytes| Const::Utf8(BStr(&bytes[..]))));

        walk_class(class, &mut Repointer { plan: self })
    }
}

struct Planner<'a, 'r, R: ?Sized> {
    utf8s: Vec<Option<&'a [u8]>>,
    classes: Vec<Option<u16>>,
    remapper: &'r mut R,
    plan: RemapPlan,
}

impl<'a, R: TypeRemapper + ?Sized> Planner<'a, '_, R> {
    fn bytes(&self, utf8: u16) -> Result<&'a [u8], RemapError> {
        self.utf8s
            .get(utf8 as usize)
            .copied()
            .flatten()
            .ok_or(RemapError::BadIndex {
                index: utf8,
                expected: "Utf8",
            })
    }

    fn resolve(&mut self, utf8: u16, role: Role) -> Result<(), RemapError> {
        if self.plan.targets.contains_key(&(utf8, role)) {
            return Ok(());
        }
        let text = parse_utf8(self.bytes(utf8)?).ok_or(RemapError::BadUtf8(utf8))?;
        let mapped = match role {
            Role::InternalName => self.remapper.map_type(&text),
            Role::Descriptor => remap_descriptor(&text, &mut *self.remapper)?,
            Role::Signature => remap_signature(&text, &mut *self.remapper)?,
        };
        let target = if mapped == text {
            utf8
        } else {
            self.plan.intern(encode_utf8(&mapped))?
        };
        self.plan.targets.insert((utf8, role), target);
        Ok(())
    }

    /// Array classes are named by their descriptor.
    fn class_constant(&mut self, index: u16) -> Result<(), RemapError> {
        let utf8 = self
            .classes
            .get(index as usize)
            .copied()
            .flatten()
            .ok_or(RemapError::BadIndex {
                index,
                expected: "Class",
            })?;
        let role = if self.bytes(utf8)?.first() == Some(&b'[') {
            Role::Descriptor
        } else {
            Role::InternalName
        };
        self.plan.class_roles.insert(utf8, role);
        self.resolve(utf8, role)
    }
}

impl<R: TypeRemapper + ?Sized> TypeSites for Planner<'_, '_, R> {
    fn site(&mut self, index: &mut u16, role: Role) -> Result<(), RemapError> {
        self.resolve(*index, role)
    }
}

struct Repointer<'p> {
    plan: &'p RemapPlan,
}

impl TypeSites for Repointer<'_> {
    fn site(&mut self, index: &mut u16, role: Role) -> Result<(), RemapError> {
        *index = self.plan.target(*index, role);
        Ok(())
    }
}

fn plan_class<R: TypeRemapper + ?Sized>(
    class: &mut Class<'_>,
    remapper: &mut R,
) -> Result<RemapPlan, RemapError> {
    let mut planner = Planner {
        utf8s: Vec::with_capacity(class.cp.0.len()),
        classes: Vec::with_capacity(class.cp.0.len()),
        remapper,
        plan: RemapPlan {
            first_new: class.cp.0.len(),
            ..Default::default()
        },
    };
    for (index, entry) in class.cp.0.iter().enumerate() {
        let utf8 = match entry {
            Const::Utf8(BStr(bytes)) => Some(*bytes),
            _ => None,
        };
        if let Some(bytes) = utf8 {
            planner
                .plan
                .by_bytes
                .entry(bytes.to_vec())
                .or_insert(index as u16);
        }
        planner.utf8s.push(utf8);
        planner.classes.push(match entry {
            Const::Class(utf8) => Some(*utf8),
            _ => None,
        });
    }

    // Header first so the class itself and its supertypes are resolved
    // before anything the body mentions.
    planner.class_constant(class.this)?;
    if class.super_ != 0 {
        planner.class_constant(class.super_)?;
    }
    for interface in &class.interfaces {
        planner.class_constant(*interface)?;
    }

    walk_class(class, &mut planner)?;

    for (index, entry) in class.cp.0.iter().enumerate() {
        match entry {
            Const::Class(_) => planner.class_constant(index as u16)?,
            Const::NameAndType(_, descriptor) | Const::MethodType(descriptor) => {
                planner.resolve(*descriptor, Role::Descriptor)?
            }
            _ => {}
        }
    }

    Ok(planner.plan)
}

fn walk_class<S: TypeSites>(class: &mut Class<'_>, sites: &mut S) -> Result<(), RemapError> {
    for member in class.fields.iter_mut().chain(class.methods.iter_mut()) {
        sites.site(&mut member.desc, Role::Descriptor)?;
        walk_attrs(&mut member.attrs, sites)?;
    }
    walk_attrs(&mut class.attrs, sites)
}

fn walk_attrs<S: TypeSites>(attrs: &mut [Attribute<'_>], sites: &mut S) -> Result<(), RemapError> {
    use AttrBody::*;
    for attr in attrs {
        match &mut attr.body {
            Signature(signature) => sites.site(signature, Role::Signature)?,
            Code((code, _)) => walk_attrs(&mut code.attrs, sites)?,
            LocalVariableTable(lines) => {
                for line in lines {
                    sites.site(&mut line.desc, Role::Descriptor)?;
                }
            }
            LocalVariableTypeTable(lines) => {
                for line in lines {
                    sites.site(&mut line.desc, Role::Signature)?;
                }
            }
            RuntimeVisibleAnnotations(annotations) | RuntimeInvisibleAnnotations(annotations) => {
                for annotation in annotations {
                    walk_annotation(annotation, sites)?;
                }
            }
            RuntimeVisibleParameterAnnotations(parameters)
            | RuntimeInvisibleParameterAnnotations(parameters) => {
                for parameter in parameters {
                    for annotation in &mut parameter.0 {
                        walk_annotation(annotation, sites)?;
                    }
                }
            }
            RuntimeVisibleTypeAnnotations(annotations)
            | RuntimeInvisibleTypeAnnotations(annotations) => {
                for annotation in annotations {
                    walk_annotation(&mut annotation.anno, sites)?;
                }
            }
            AnnotationDefault(value) => walk_element(value, sites)?,
            Record(components) => {
                for component in components {
                    sites.site(&mut component.desc, Role::Descriptor)?;
                    walk_attrs(&mut component.attrs, sites)?;
                }
            }
            _ => {}
        }
    }
    Ok(())
}

fn walk_annotation<S: TypeSites>(
    annotation: &mut Annotation,
    sites: &mut S,
) -> Result<(), RemapError> {
    sites.site(&mut annotation.0, Role::Descriptor)?;
    for (_name, value) in &mut annotation.1 {
        walk_element(value, sites)?;
    }
    Ok(())
}

/// String, primitive and enum constant name elements are left alone.
fn walk_element<S: TypeSites>(value: &mut ElementValue, sites: &mut S) -> Result<(), RemapError> {
    match value {
        ElementValue::Enum(type_name, _) | ElementValue::Class(type_name) => {
            sites.site(type_name, Role::Descriptor)?
        }
        ElementValue::Anno(annotation) => walk_annotation(annotation, sites)?,
        ElementValue::Array(values) => {
            for value in values {
                walk_element(value, sites)?;
            }
        }
        _ => {}
    }
    Ok(())
}

/// Modified UTF-8: NUL and supplementary characters take the JVM's forms.
fn encode_utf8(text: &str) -> Vec<u8> {
    if text.is_ascii() && !text.contains('\0') {
        return text.as_bytes().to_vec();
    }

    let mut out = Vec::with_capacity(text.len() + 8);
    for unit in text.encode_utf16() {
        match unit {
            0x0001..=0x007F => out.push(unit as u8),
            0x0000 | 0x0080..=0x07FF => {
                out.push(0xC0 | (unit >> 6) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
            _ => {
                out.push(0xE0 | (unit >> 12) as u8);
                out.push(0x80 | ((unit >> 6) & 0x3F) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jar::core::fixtures::ClassFileBuilder;

    #[derive(Default)]
    struct Prefixer {
        seen: Vec<String>,
    }

    impl TypeRemapper for Prefixer {
        fn map_type(&mut self, internal_name: &str) -> String {
            self.seen.push(internal_name.to_owned());
            if internal_name.starts_with("java/") {
                internal_name.to_owned()
            } else {
                format!("shadow/{internal_name}")
            }
        }
    }

    fn remap(bytes: &[u8]) -> (Vec<u8>, Prefixer) {
        let mut remapper = Prefixer::default();
        let out = remap_class(parse(bytes).unwrap(), &mut remapper).unwrap();
        (out, remapper)
    }

    fn text(class: &Class<'_>, index: u16) -> String {
        String::from_utf8(class.cp.utf8(index).unwrap().to_vec()).unwrap()
    }

    fn class_names(class: &Class<'_>) -> Vec<String> {
        class
            .cp
            .0
            .iter()
            .filter_map(|c| match c {
                Const::Class(utf8) => Some(text(class, *utf8)),
                _ => None,
            })
            .collect()
    }

    fn member_descriptors(class: &Class<'_>) -> Vec<String> {
        class
            .fields
            .iter()
            .chain(class.methods.iter())
            .map(|member| text(class, member.desc))
            .collect()
    }

    /// Every UTF-8 constant of `before` still holds the same bytes in `after`.
    fn assert_original_constants_kept(before: &[u8], after: &[u8]) {
        let before = parse(before).unwrap();
        let after = parse(after).unwrap();
        assert!(after.cp.0.len() >= before.cp.0.len());
        for index in 1..before.cp.0.len() as u16 {
            assert_eq!(before.cp.utf8(index), after.cp.utf8(index), "constant {index}");
        }
    }

    #[test]
    fn relocates_header_and_member_types() {
        let bytes = ClassFileBuilder::new("com/acme/Main")
            .interface("com/acme/Service")
            .field("helper", "Lcom/acme/Helper;")
            .method("run", "(Ljava/lang/String;Lcom/acme/Util;)V")
            .build();
        let (out, remapper) = remap(&bytes);

        let class = parse(&out).unwrap();
        assert_eq!(class_name(&class).unwrap(), "shadow/com/acme/Main");
        assert_eq!(
            class_names(&class),
            vec!["shadow/com/acme/Main", "java/lang/Object", "shadow/com/acme/Service"]
        );
        assert_eq!(
            member_descriptors(&class),
            vec![
                "Lshadow/com/acme/Helper;",
                "(Ljava/lang/String;Lshadow/com/acme/Util;)V"
            ]
        );
        assert_eq!(
            &remapper.seen[..3],
            &["com/acme/Main", "java/lang/Object", "com/acme/Service"]
        );
        assert_original_constants_kept(&bytes, &out);
    }

    #[test]
    fn string_literal_matching_a_class_name_is_kept() {
        let bytes = ClassFileBuilder::new("com/acme/Main")
            .class_ref("com/acme/Helper")
            .string("com/acme/Helper")
            .build();
        let (out, _) = remap(&bytes);
        let class = parse(&out).unwrap();
        assert!(class_names(&class).contains(&"shadow/com/acme/Helper".to_owned()));
        assert_original_constants_kept(&bytes, &out);
    }

    #[test]
    fn annotation_string_sharing_a_descriptor_constant_is_kept() {
        let builder = ClassFileBuilder::new("com/acme/Main")
            .field("helper", "Lcom/acme/Helper;")
            .string_annotation("Lcom/acme/Marker;", "Lcom/acme/Helper;");
        let shared = builder.utf8_index("Lcom/acme/Helper;").unwrap();
        let bytes = builder.build();

        let (out, _) = remap(&bytes);
        let class = parse(&out).unwrap();
        assert_eq!(member_descriptors(&class), vec!["Lshadow/com/acme/Helper;"]);
        assert_ne!(class.fields[0].desc, shared);
        assert_eq!(text(&class, shared), "Lcom/acme/Helper;");
        assert_original_constants_kept(&bytes, &out);
    }

    #[test]
    fn lone_surrogate_string_literal_is_carried_over() {
        let mut bytes = ClassFileBuilder::new("com/acme/Main")
            .field("helper", "Lcom/acme/Helper;")
            .string("QQQ")
            .build();
        // javac writes "\uD800" as a three byte surrogate, which no String holds.
        let at = bytes.windows(3).position(|w| w == b"QQQ").unwrap();
        bytes[at..at + 3].copy_from_slice(&[0xED, 0xA0, 0x80]);

        let (out, _) = remap(&bytes);
        assert!(out.windows(3).any(|w| w == [0xED, 0xA0, 0x80]));
        let class = parse(&out).unwrap();
        assert_eq!(member_descriptors(&class), vec!["Lshadow/com/acme/Helper;"]);
        assert_original_constants_kept(&bytes, &out);
    }

    #[test]
    fn existing_constant_with_the_new_text_is_reused() {
        let bytes = ClassFileBuilder::new("com/acme/Main")
            .field("helper", "Lcom/acme/Helper;")
            .string("Lshadow/com/acme/Helper;")
            .build();
        let existing = parse(&bytes).unwrap().cp.0.len();
        let (out, _) = remap(&bytes);
        let class = parse(&out).unwrap();
        assert_eq!(member_descriptors(&class), vec!["Lshadow/com/acme/Helper;"]);
        assert!((class.fields[0].desc as usize) < existing);
    }

    #[test]
    fn member_references_and_method_types() {
        let bytes = ClassFileBuilder::new("com/acme/Main")
            .method_ref("com/acme/Helper", "help", "(Lcom/acme/Arg;)Lcom/acme/Result;")
            .method_type("(Lcom/acme/Arg;)V")
            .build();
        let (out, _) = remap(&bytes);
        let class = parse(&out).unwrap();
        let descriptors: Vec<_> = class
            .cp
            .0
            .iter()
            .filter_map(|c| match c {
                Const::NameAndType(_, d) | Const::MethodType(d) => Some(text(&class, *d)),
                _ => None,
            })
            .collect();
        assert_eq!(
            descriptors,
            vec![
                "(Lshadow/com/acme/Arg;)Lshadow/com/acme/Result;",
                "(Lshadow/com/acme/Arg;)V"
            ]
        );
        assert!(class_names(&class).contains(&"shadow/com/acme/Helper".to_owned()));
    }

    #[test]
    fn array_classes_are_descriptors() {
        let bytes = ClassFileBuilder::new("com/acme/Main")
            .class_ref("[[Lcom/acme/Cell;")
            .class_ref("[I")
            .build();
        let (out, _) = remap(&bytes);
        let class = parse(&out).unwrap();
        let names = class_names(&class);
        assert!(names.contains(&"[[Lshadow/com/acme/Cell;".to_owned()));
        assert!(names.contains(&"[I".to_owned()));
    }

    #[test]
    fn signatures_and_annotations() {
        let bytes = ClassFileBuilder::new("com/acme/Main")
            .method_with_signature(
                "list",
                "()Ljava/util/List;",
                "<T:Lcom/acme/Bound;>()Ljava/util/List<+TT;>;",
            )
            .annotation("Lcom/acme/Marker;", "Lcom/acme/Helper;")
            .build();
        let (out, remapper) = remap(&bytes);
        let class = parse(&out).unwrap();
        assert_eq!(member_descriptors(&class), vec!["()Ljava/util/List;"]);
        for name in ["com/acme/Bound", "com/acme/Marker", "com/acme/Helper"] {
            assert!(remapper.seen.contains(&name.to_owned()), "{name}");
        }
        let texts: Vec<_> = (1..class.cp.0.len() as u16)
            .filter_map(|i| class.cp.utf8(i))
            .map(|bytes| String::from_utf8(bytes.to_vec()).unwrap())
            .collect();
        for relocated in [
            "<T:Lshadow/com/acme/Bound;>()Ljava/util/List<+TT;>;",
            "Lshadow/com/acme/Marker;",
            "Lshadow/com/acme/Helper;",
        ] {
            assert!(texts.contains(&relocated.to_owned()), "{relocated}");
        }
    }

    #[test]
    fn identity_remapping_adds_no_constants() {
        struct Identity;
        impl TypeRemapper for Identity {
            fn map_type(&mut self, internal_name: &str) -> String {
                internal_name.to_owned()
            }
        }

        let bytes = ClassFileBuilder::new("com/acme/Main")
            .field("helper", "Lcom/acme/Helper;")
            .string("com/acme/Main")
            .method_ref("com/acme/Helper", "help", "()V")
            .build();
        let out = remap_class(parse(&bytes).unwrap(), &mut Identity).unwrap();
        assert_eq!(parse(&out).unwrap().cp.0.len(), parse(&bytes).unwrap().cp.0.len());
        assert_original_constants_kept(&bytes, &out);
    }

    #[test]
    fn malformed_descriptor_is_an_error() {
        let bytes = ClassFileBuilder::new("com/acme/Main")
            .field("broken", "Lcom/acme/Broken")
            .build();
        assert!(matches!(
            remap_class(parse(&bytes).unwrap(), &mut Prefixer::default()),
            Err(RemapError::BadDescriptor(_))
        ));
    }

    #[test]
    fn encodes_nul_and_supplementary_chars_the_jvm_way() {
        let encoded = encode_utf8("a\0b\u{1F600}");
        assert_eq!(
            encoded,
            [b'a', 0xC0, 0x80, b'b', 0xED, 0xA0, 0xBD, 0xED, 0xB8, 0x80]
        );
    }
}
