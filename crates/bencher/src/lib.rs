/// The boundary of every generated multipart body.
pub const BOUNDARY: &str = "----micro-body-bench-boundary";

#[derive(Debug, Clone)]
pub struct TestCase {
    name: &'static str,
    group: TestGroup,
    content: String,
}

impl TestCase {
    pub fn new(name: &'static str, group: TestGroup, content: String) -> Self {
        Self { name, group, content }
    }

    pub fn small(name: &'static str, content: String) -> Self {
        Self::new(name, TestGroup::Small, content)
    }

    pub fn normal(name: &'static str, content: String) -> Self {
        Self::new(name, TestGroup::Normal, content)
    }

    pub fn large(name: &'static str, content: String) -> Self {
        Self::new(name, TestGroup::Large, content)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn group(&self) -> TestGroup {
        self.group
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}

#[derive(Clone, Copy, Debug)]
pub enum TestGroup {
    Small,
    Normal,
    Large,
}

/// Builds a multipart body with `fields` field parts followed by one file part of `file_size` bytes.
pub fn multipart_body(fields: usize, file_size: usize) -> String {
    let mut body = String::with_capacity(file_size + fields * 96 + 256);

    for i in 0..fields {
        body.push_str(&format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"user[{i}][email]\"\r\n\r\nuser{i}@example.com\r\n"
        ));
    }

    body.push_str(&format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"avatar\"; filename=\"avatar.bin\"\r\nContent-Type: application/octet-stream\r\n\r\n"
    ));
    // content which often looks like the start of a boundary
    body.extend(std::iter::repeat_n("-\r\n--", file_size / 5));
    body.push_str(&format!("\r\n--{BOUNDARY}--\r\n"));
    body
}

/// Builds `count` bracket-notation keys of increasing depth.
pub fn nested_keys(count: usize) -> Vec<String> {
    (0..count)
        .map(|i| match i % 4 {
            0 => format!("user[{}][email]", i % 16),
            1 => format!("user[{}][roles][]", i % 16),
            2 => format!("settings[theme][colors][c{i}]"),
            _ => "tags[]".to_owned(),
        })
        .collect()
}
