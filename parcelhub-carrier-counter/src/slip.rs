//! Rendering of pickup slips as ZPL or single-page PDF.

/// Text content of a pickup slip.
pub(crate) struct Slip {
    pub(crate) lines: Vec<String>,
    pub(crate) barcode: String,
}

// 4x6 inch label in PDF points.
const PAGE_WIDTH: u32 = 288;
const PAGE_HEIGHT: u32 = 432;
const MARGIN: u32 = 18;
const LEADING: u32 = 16;

impl Slip {
    pub(crate) fn zpl(&self) -> Vec<u8> {
        let mut out = String::from("^XA\n^CI28\n^CF0,28\n");
        let mut offset = 40;
        for line in &self.lines {
            out.push_str(&zpl_field(40, offset, line));
            offset += 40;
        }
        out.push_str("^BY2\n");
        out.push_str(&format!(
            "^FO40,{}^BCN,100,Y,N,N^FD{}^FS\n",
            offset + 20,
            zpl_escape(&self.barcode)
        ));
        out.push_str("^XZ\n");
        out.into_bytes()
    }

    pub(crate) fn pdf(&self) -> Vec<u8> {
        let content = self.pdf_content();
        let objects = [
            "<< /Type /Catalog /Pages 2 0 R >>".to_owned(),
            "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_owned(),
            format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {PAGE_WIDTH} {PAGE_HEIGHT}] \
                 /Resources << /Font << /F1 4 0 R >> >> /Contents 5 0 R >>"
            ),
            "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_owned(),
            format!(
                "<< /Length {} >>\nstream\n{content}\nendstream",
                content.len()
            ),
        ];

        let mut out = b"%PDF-1.4\n".to_vec();
        let mut offsets = Vec::with_capacity(objects.len());
        for (index, body) in objects.iter().enumerate() {
            offsets.push(out.len());
            out.extend_from_slice(format!("{} 0 obj\n{body}\nendobj\n", index + 1).as_bytes());
        }

        let xref_offset = out.len();
        out.extend_from_slice(format!("xref\n0 {}\n", objects.len() + 1).as_bytes());
        out.extend_from_slice(b"0000000000 65535 f \n");
        for offset in offsets {
            out.extend_from_slice(format!("{offset:010} 00000 n \n").as_bytes());
        }
        out.extend_from_slice(
            format!(
                "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{xref_offset}\n%%EOF\n",
                objects.len() + 1
            )
            .as_bytes(),
        );
        out
    }

    fn pdf_content(&self) -> String {
        let top = PAGE_HEIGHT - MARGIN - LEADING;
        let mut content = format!("BT\n/F1 12 Tf\n{LEADING} TL\n{MARGIN} {top} Td\n");
        for line in self.lines.iter().chain(std::iter::once(&self.barcode)) {
            content.push_str(&format!("({}) Tj T*\n", pdf_escape(line)));
        }
        content.push_str("ET");
        content
    }
}

fn zpl_field(x: u32, y: u32, text: &str) -> String {
    format!("^FO{x},{y}^FD{}^FS\n", zpl_escape(text))
}

// ^ and ~ start ZPL commands.
fn zpl_escape(text: &str) -> String {
    text.chars().filter(|ch| !matches!(ch, '^' | '~')).collect()
}

// Helvetica via WinAnsi only covers ASCII safely.
fn pdf_escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '(' | ')' | '\\' => {
                escaped.push('\\');
                escaped.push(ch);
            }
            ' '..='~' => escaped.push(ch),
            _ => escaped.push('?'),
        }
    }
    escaped
}
