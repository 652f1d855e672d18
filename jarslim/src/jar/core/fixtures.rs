//! Hand-assembled class files for tests.
//!
//! Only depends on `std` so the integration tests can pull it in with
//! `#[path]`.

use std::collections::HashMap;

const ACC_PUBLIC: u16 = 0x0001;
const ACC_SUPER: u16 = 0x0020;
const ACC_ABSTRACT: u16 = 0x0400;

enum Entry {
    Utf8(String),
    Long(u64),
    Class(u16),
    String(u16),
    MethodRef(u16, u16),
    NameAndType(u16, u16),
    MethodType(u16),
}

struct Member {
    name: u16,
    descriptor: u16,
    attributes: Vec<(u16, Vec<u8>)>,
}

pub struct ClassFileBuilder {
    pool: Vec<Entry>,
    utf8s: HashMap<String, u16>,
    classes: HashMap<String, u16>,
    this_class: u16,
    super_class: u16,
    interfaces: Vec<u16>,
    fields: Vec<Member>,
    methods: Vec<Member>,
    attributes: Vec<(u16, Vec<u8>)>,
}

impl ClassFileBuilder {
    pub fn new(name: &str) -> Self {
        let mut builder = Self {
            pool: Vec::new(),
            utf8s: HashMap::new(),
            classes: HashMap::new(),
            this_class: 0,
            super_class: 0,
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            attributes: Vec::new(),
        };
        builder.this_class = builder.class(name);
        builder.super_class = builder.class("java/lang/Object");
        builder
    }

    fn next_index(&self) -> u16 {
        let wide = self
            .pool
            .iter()
            .filter(|e| matches!(e, Entry::Long(_)))
            .count();
        (self.pool.len() + wide + 1) as u16
    }

    fn push(&mut self, entry: Entry) -> u16 {
        let index = self.next_index();
        self.pool.push(entry);
        index
    }

    fn utf8(&mut self, text: &str) -> u16 {
        if let Some(index) = self.utf8s.get(text) {
            return *index;
        }
        let index = self.push(Entry::Utf8(text.to_owned()));
        self.utf8s.insert(text.to_owned(), index);
        index
    }

    fn class(&mut self, name: &str) -> u16 {
        if let Some(index) = self.classes.get(name) {
            return *index;
        }
        let name_index = self.utf8(name);
        let index = self.push(Entry::Class(name_index));
        self.classes.insert(name.to_owned(), index);
        index
    }

    pub fn super_class(mut self, name: &str) -> Self {
        self.super_class = self.class(name);
        self
    }

    pub fn interface(mut self, name: &str) -> Self {
        let index = self.class(name);
        self.interfaces.push(index);
        self
    }

    pub fn class_ref(mut self, name: &str) -> Self {
        self.class(name);
        self
    }

    pub fn field(mut self, name: &str, descriptor: &str) -> Self {
        let member = Member {
            name: self.utf8(name),
            descriptor: self.utf8(descriptor),
            attributes: Vec::new(),
        };
        self.fields.push(member);
        self
    }

    pub fn method(mut self, name: &str, descriptor: &str) -> Self {
        let member = Member {
            name: self.utf8(name),
            descriptor: self.utf8(descriptor),
            attributes: Vec::new(),
        };
        self.methods.push(member);
        self
    }

    pub fn method_with_signature(mut self, name: &str, descriptor: &str, signature: &str) -> Self {
        let attribute = self.signature_attribute(signature);
        let member = Member {
            name: self.utf8(name),
            descriptor: self.utf8(descriptor),
            attributes: vec![attribute],
        };
        self.methods.push(member);
        self
    }

    pub fn method_ref(mut self, owner: &str, name: &str, descriptor: &str) -> Self {
        let owner = self.class(owner);
        let name = self.utf8(name);
        let descriptor = self.utf8(descriptor);
        let nat = self.push(Entry::NameAndType(name, descriptor));
        self.push(Entry::MethodRef(owner, nat));
        self
    }

    pub fn method_type(mut self, descriptor: &str) -> Self {
        let descriptor = self.utf8(descriptor);
        self.push(Entry::MethodType(descriptor));
        self
    }

    pub fn string(mut self, text: &str) -> Self {
        let utf8 = self.utf8(text);
        self.push(Entry::String(utf8));
        self
    }

    pub fn long_constant(mut self, value: u64) -> Self {
        self.push(Entry::Long(value));
        self
    }

    fn signature_attribute(&mut self, signature: &str) -> (u16, Vec<u8>) {
        let name = self.utf8("Signature");
        let value = self.utf8(signature);
        (name, value.to_be_bytes().to_vec())
    }

    pub fn signature(mut self, signature: &str) -> Self {
        let attribute = self.signature_attribute(signature);
        self.attributes.push(attribute);
        self
    }

    /// Class level `RuntimeVisibleAnnotations` with a single annotation that
    /// has one class-valued element.
    pub fn annotation(mut self, descriptor: &str, class_value: &str) -> Self {
        let name = self.utf8("RuntimeVisibleAnnotations");
        let type_index = self.utf8(descriptor);
        let element_name = self.utf8("value");
        let class_info = self.utf8(class_value);

        let mut body = Vec::new();
        body.extend_from_slice(&1u16.to_be_bytes());
        body.extend_from_slice(&type_index.to_be_bytes());
        body.extend_from_slice(&1u16.to_be_bytes());
        body.extend_from_slice(&element_name.to_be_bytes());
        body.push(b'c');
        body.extend_from_slice(&class_info.to_be_bytes());
        self.attributes.push((name, body));
        self
    }

    /// Class level `RuntimeVisibleAnnotations` with a single annotation that
    /// has one string-valued element.
    pub fn string_annotation(mut self, descriptor: &str, value: &str) -> Self {
        let name = self.utf8("RuntimeVisibleAnnotations");
        let type_index = self.utf8(descriptor);
        let element_name = self.utf8("value");
        let value = self.utf8(value);

        let mut body = Vec::new();
        body.extend_from_slice(&1u16.to_be_bytes());
        body.extend_from_slice(&type_index.to_be_bytes());
        body.extend_from_slice(&1u16.to_be_bytes());
        body.extend_from_slice(&element_name.to_be_bytes());
        body.push(b's');
        body.extend_from_slice(&value.to_be_bytes());
        self.attributes.push((name, body));
        self
    }

    /// Pool index of the UTF-8 constant holding `text`, if any.
    pub fn utf8_index(&self, text: &str) -> Option<u16> {
        self.utf8s.get(text).copied()
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&0xCAFE_BABEu32.to_be_bytes());
        out.extend_from_slice(&0u16.to_be_bytes());
        out.extend_from_slice(&52u16.to_be_bytes());

        out.extend_from_slice(&self.next_index().to_be_bytes());
        for entry in &self.pool {
            match entry {
                Entry::Utf8(text) => {
                    out.push(1);
                    out.extend_from_slice(&(text.len() as u16).to_be_bytes());
                    out.extend_from_slice(text.as_bytes());
                }
                Entry::Long(value) => {
                    out.push(5);
                    out.extend_from_slice(&value.to_be_bytes());
                }
                Entry::Class(name) => {
                    out.push(7);
                    out.extend_from_slice(&name.to_be_bytes());
                }
                Entry::String(utf8) => {
                    out.push(8);
                    out.extend_from_slice(&utf8.to_be_bytes());
                }
                Entry::MethodRef(owner, nat) => {
                    out.push(10);
                    out.extend_from_slice(&owner.to_be_bytes());
                    out.extend_from_slice(&nat.to_be_bytes());
                }
                Entry::NameAndType(name, descriptor) => {
                    out.push(12);
                    out.extend_from_slice(&name.to_be_bytes());
                    out.extend_from_slice(&descriptor.to_be_bytes());
                }
                Entry::MethodType(descriptor) => {
                    out.push(16);
                    out.extend_from_slice(&descriptor.to_be_bytes());
                }
            }
        }

        out.extend_from_slice(&(ACC_PUBLIC | ACC_SUPER | ACC_ABSTRACT).to_be_bytes());
        out.extend_from_slice(&self.this_class.to_be_bytes());
        out.extend_from_slice(&self.super_class.to_be_bytes());
        out.extend_from_slice(&(self.interfaces.len() as u16).to_be_bytes());
        for interface in &self.interfaces {
            out.extend_from_slice(&interface.to_be_bytes());
        }

        write_members(&mut out, &self.fields, ACC_PUBLIC);
        write_members(&mut out, &self.methods, ACC_PUBLIC | ACC_ABSTRACT);
        write_attributes(&mut out, &self.attributes);
        out
    }
}

fn write_members(out: &mut Vec<u8>, members: &[Member], access: u16) {
    out.extend_from_slice(&(members.len() as u16).to_be_bytes());
    for member in members {
        out.extend_from_slice(&access.to_be_bytes());
        out.extend_from_slice(&member.name.to_be_bytes());
        out.extend_from_slice(&member.descriptor.to_be_bytes());
        write_attributes(out, &member.attributes);
    }
}

fn write_attributes(out: &mut Vec<u8>, attributes: &[(u16, Vec<u8>)]) {
    out.extend_from_slice(&(attributes.len() as u16).to_be_bytes());
    for (name, body) in attributes {
        out.extend_from_slice(&name.to_be_bytes());
        out.extend_from_slice(&(body.len() as u32).to_be_bytes());
        out.extend_from_slice(body);
    }
}
