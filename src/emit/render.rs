//! Rice C++ text for a [`UnitPlan`].
//!
//! Registration calls are rendered as method chains: one statement per class or enum,
//! one chained call per member, arguments on a continuation line.

use super::{
    ArgKind, ArgSpec, BindingEmission, Builder, ClassEmission, EmitOp, EnumEmission,
    FunctionEmission, Lambda, Member, UnitPlan,
};
use crate::naming::case::camelize;

/// The files generated for one header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedUnit {
    pub stem: String,
    pub cpp: String,
    pub hpp: String,
    /// Template builders, when the header defines any.
    pub ipp: Option<String>,
}

pub fn render_unit(plan: &UnitPlan) -> GeneratedUnit {
    GeneratedUnit {
        stem: plan.stem.clone(),
        cpp: render_cpp(plan),
        hpp: render_hpp(plan),
        ipp: (!plan.builders.is_empty()).then(|| render_ipp(&plan.builders)),
    }
}

/// `<project>-rb.cpp`: the extension entry point calling every unit's `Init_` function.
pub fn render_aggregate(project: &str, units: &[UnitPlan]) -> String {
    let mut out = String::new();
    for unit in units {
        out.push_str(&format!("#include \"{}-rb.hpp\"\n", unit.stem));
    }
    out.push_str(&format!("\nextern \"C\"\nvoid Init_{}()\n{{\n", camelize(project)));
    for unit in units {
        out.push_str(&format!("  {}();\n", unit.init));
    }
    out.push_str("}\n");
    out
}

fn render_cpp(plan: &UnitPlan) -> String {
    let mut out = format!("#include <{}>\n#include \"{}-rb.hpp\"\n", plan.include, plan.stem);
    if plan.needs_sstream {
        out.push_str("#include <sstream>\n");
    }
    out.push_str("\nusing namespace Rice;\n");
    if !plan.ipp_includes.is_empty() {
        out.push('\n');
        for stem in &plan.ipp_includes {
            out.push_str(&format!("#include \"{stem}-rb.ipp\"\n"));
        }
    }
    if !plan.handles.is_empty() {
        out.push('\n');
        for handle in &plan.handles {
            out.push_str(&format!("static {} {};\n", handle.ty, handle.handle));
        }
    }

    out.push_str(&format!("\nvoid {}()\n{{\n", plan.init));
    let statements: Vec<String> = plan.emissions.iter().map(render_emission).collect();
    out.push_str(&statements.join("\n\n"));
    if !statements.is_empty() {
        out.push('\n');
    }
    out.push_str("}\n");
    out
}

fn render_hpp(plan: &UnitPlan) -> String {
    format!(
        "#pragma once\n\n#include <rice/rice.hpp>\n#include <rice/stl.hpp>\n\nvoid {}();\n",
        plan.init
    )
}

fn render_ipp(builders: &[Builder]) -> String {
    let rendered: Vec<String> = builders
        .iter()
        .map(|b| {
            let mut params = vec!["typename Data_Type_T".to_string()];
            params.extend(b.params.iter().cloned());
            format!(
                "template<{}>\ninline void {}(Data_Type_T& klass)\n{{\n{};\n}}\n",
                params.join(", "),
                b.function,
                chain("  klass", &b.members, true)
            )
        })
        .collect();
    rendered.join("\n")
}

fn render_emission(emission: &BindingEmission) -> String {
    let assign = |expr: String| match &emission.handle {
        Some(handle) => format!("  {handle} = {expr}"),
        None => format!("  {expr}"),
    };
    match &emission.op {
        EmitOp::Module { name, parent } => match parent {
            Some(parent) => assign(format!("define_module_under({parent}, \"{name}\");")),
            None => assign(format!("define_module(\"{name}\");")),
        },
        EmitOp::Class(class) => format!("{};", chain(&assign(class_head(class)), &class.members, false)),
        EmitOp::Enum(en) => format!("{};", assign(enum_chain(en))),
        EmitOp::Constant { scope, name, value } => {
            format!("  {scope}.define_constant(\"{name}\", {value});")
        }
        EmitOp::Function(function) => format!("  {};", render_function(function)),
        EmitOp::Wrappers { target, members } => format!("{};", chain(&format!("  {target}"), members, false)),
    }
}

fn class_head(class: &ClassEmission) -> String {
    let types = match &class.base {
        Some(base) => format!("{}, {base}", class.cpp),
        None => class.cpp.clone(),
    };
    match &class.parent {
        Some(parent) => format!("define_class_under<{types}>({parent}, \"{}\")", class.name),
        None => format!("define_class<{types}>(\"{}\")", class.name),
    }
}

fn enum_chain(en: &EnumEmission) -> String {
    let mut out = match &en.parent {
        Some(parent) => format!("define_enum_under<{}>(\"{}\", {parent})", en.cpp, en.name),
        None => format!("define_enum<{}>(\"{}\")", en.cpp, en.name),
    };
    for (name, value) in &en.values {
        out.push_str(&format!(".\n    define_value(\"{name}\", {value})"));
    }
    out
}

fn render_function(function: &FunctionEmission) -> String {
    let call = match &function.module {
        Some(module) => format!("{module}.define_module_function"),
        None => "define_global_function".to_string(),
    };
    let signature = function
        .signature
        .as_ref()
        .map(|s| format!("<{s}>"))
        .unwrap_or_default();
    format!(
        "{call}{signature}(\"{}\", {}{})",
        function.name,
        function.pointer,
        trailing(&function.args, function.return_buffer, 4)
    )
}

/// `head` followed by one `.member` per line.
fn chain(head: &str, members: &[Member], in_builder: bool) -> String {
    let mut out = head.to_string();
    for member in members {
        out.push_str(".\n    ");
        if in_builder && member.has_template_args() {
            out.push_str("template ");
        }
        out.push_str(&render_member(member));
    }
    out
}

fn render_member(member: &Member) -> String {
    match member {
        Member::Constructor {
            class,
            params,
            args,
        } => {
            let mut types = vec![class.clone()];
            types.extend(params.iter().cloned());
            format!(
                "define_constructor(Constructor<{}>(){})",
                types.join(", "),
                trailing(args, false, 6)
            )
        }
        Member::Method {
            name,
            signature,
            pointer,
            args,
            return_buffer,
            singleton,
        } => {
            let call = if *singleton {
                "define_singleton_function"
            } else {
                "define_method"
            };
            let signature = signature.as_ref().map(|s| format!("<{s}>")).unwrap_or_default();
            format!(
                "{call}{signature}(\"{name}\", {pointer}{})",
                trailing(args, *return_buffer, 6)
            )
        }
        Member::Attr {
            name,
            pointer,
            read_only,
            singleton,
        } => {
            let call = if *singleton {
                "define_singleton_attr"
            } else {
                "define_attr"
            };
            let access = if *read_only {
                ", Rice::AttrAccess::Read"
            } else {
                ""
            };
            format!("{call}(\"{name}\", {pointer}{access})")
        }
        Member::Constant { name, value } => format!("define_constant(\"{name}\", {value})"),
        Member::Iterator {
            name,
            signature,
            begin,
            end,
        } => format!("define_iterator<{signature}>({begin}, {end}, \"{name}\")"),
        Member::Lambda(lambda) => render_lambda(lambda),
        Member::Define {
            function,
            class,
            args,
        } => {
            let mut types = vec![format!("Data_Type<{class}>")];
            types.extend(args.iter().cloned());
            format!("define(&{function}<{}>)", types.join(", "))
        }
    }
}

fn render_lambda(lambda: &Lambda) -> String {
    let ret = lambda
        .ret
        .as_ref()
        .map(|r| format!(" -> {r}"))
        .unwrap_or_default();
    let mut out = format!("define_method(\"{}\", []({}){ret}\n    {{\n", lambda.name, lambda.params);
    for line in &lambda.body {
        out.push_str(&format!("      {line}\n"));
    }
    out.push_str("    })");
    out
}

/// Argument descriptors after the function pointer, on a continuation line.
fn trailing(args: &[ArgSpec], return_buffer: bool, indent: usize) -> String {
    let mut parts: Vec<String> = args.iter().map(render_arg).collect();
    if return_buffer {
        parts.push("ReturnBuffer()".to_string());
    }
    if parts.is_empty() {
        return String::new();
    }
    format!(",\n{}{}", " ".repeat(indent), parts.join(", "))
}

fn render_arg(arg: &ArgSpec) -> String {
    let class = match &arg.kind {
        ArgKind::Arg => "Arg".to_string(),
        ArgKind::Buffer => "ArgBuffer".to_string(),
        ArgKind::Dependent(param) => {
            format!("std::conditional_t<std::is_fundamental_v<{param}>, ArgBuffer, Arg>")
        }
    };
    match &arg.default {
        Some(default) => format!("{class}(\"{}\") = {default}", arg.name),
        None => format!("{class}(\"{}\")", arg.name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emit::HandleDecl;
    use crate::types::{DeclId, HeaderId};

    fn arg(name: &str) -> ArgSpec {
        ArgSpec {
            name: name.to_string(),
            kind: ArgKind::Arg,
            default: None,
        }
    }

    fn unit(emissions: Vec<BindingEmission>) -> UnitPlan {
        UnitPlan {
            header: HeaderId(0),
            stem: "classes".to_string(),
            include: "classes.hpp".to_string(),
            init: "Init_Classes".to_string(),
            handles: vec![HandleDecl {
                qualified: "Outer".to_string(),
                ty: "Rice::Module".to_string(),
                handle: "rb_mOuter".to_string(),
            }],
            ipp_includes: Vec::new(),
            builders: Vec::new(),
            emissions,
            needs_sstream: false,
        }
    }

    #[test]
    fn test_class_chain() {
        let plan = unit(vec![
            BindingEmission {
                decl: DeclId(1),
                handle: Some("rb_mOuter".to_string()),
                op: EmitOp::Module {
                    name: "Outer".to_string(),
                    parent: None,
                },
            },
            BindingEmission {
                decl: DeclId(2),
                handle: Some("rb_cOuterMyClass".to_string()),
                op: EmitOp::Class(ClassEmission {
                    cpp: "Outer::MyClass".to_string(),
                    name: "MyClass".to_string(),
                    parent: Some("rb_mOuter".to_string()),
                    base: Some("Outer::BaseClass".to_string()),
                    members: vec![
                        Member::Constructor {
                            class: "Outer::MyClass".to_string(),
                            params: vec!["int".to_string()],
                            args: vec![arg("a")],
                        },
                        Member::Method {
                            name: "method_two".to_string(),
                            signature: Some("void(Outer::MyClass::*)(int, bool)".to_string()),
                            pointer: "&Outer::MyClass::methodTwo".to_string(),
                            args: vec![arg("a"), arg("b")],
                            return_buffer: false,
                            singleton: false,
                        },
                        Member::Attr {
                            name: "c".to_string(),
                            pointer: "&Outer::MyClass::c".to_string(),
                            read_only: true,
                            singleton: false,
                        },
                    ],
                }),
            },
        ]);
        let cpp = render_unit(&plan).cpp;
        assert!(cpp.starts_with("#include <classes.hpp>\n#include \"classes-rb.hpp\"\n\nusing namespace Rice;\n"));
        assert!(cpp.contains("static Rice::Module rb_mOuter;\n"));
        assert!(cpp.contains("  rb_mOuter = define_module(\"Outer\");\n\n"));
        assert!(cpp.contains(
            "  rb_cOuterMyClass = define_class_under<Outer::MyClass, Outer::BaseClass>(rb_mOuter, \"MyClass\").\n    \
             define_constructor(Constructor<Outer::MyClass, int>(),\n      Arg(\"a\")).\n    \
             define_method<void(Outer::MyClass::*)(int, bool)>(\"method_two\", &Outer::MyClass::methodTwo,\n      Arg(\"a\"), Arg(\"b\")).\n    \
             define_attr(\"c\", &Outer::MyClass::c, Rice::AttrAccess::Read);\n"
        ));
        assert!(cpp.ends_with("}\n"));
    }

    #[test]
    fn test_builder_prefixes_explicit_template_calls() {
        let builder = Builder {
            template: DeclId(3),
            function: "Matrix_builder".to_string(),
            params: vec!["typename T".to_string(), "int Rows".to_string()],
            members: vec![
                Member::Constructor {
                    class: "Tests::Matrix<T, Rows>".to_string(),
                    params: Vec::new(),
                    args: Vec::new(),
                },
                Member::Method {
                    name: "get".to_string(),
                    signature: Some("T(Tests::Matrix<T, Rows>::*)(int) const".to_string()),
                    pointer: "&Tests::Matrix<T, Rows>::get".to_string(),
                    args: vec![arg("row")],
                    return_buffer: false,
                    singleton: false,
                },
            ],
        };
        let ipp = render_ipp(&[builder]);
        assert_eq!(
            ipp,
            "template<typename Data_Type_T, typename T, int Rows>\n\
             inline void Matrix_builder(Data_Type_T& klass)\n{\n  klass.\n    \
             define_constructor(Constructor<Tests::Matrix<T, Rows>>()).\n    \
             template define_method<T(Tests::Matrix<T, Rows>::*)(int) const>(\"get\", &Tests::Matrix<T, Rows>::get,\n      Arg(\"row\"));\n}\n"
        );
    }

    #[test]
    fn test_functions_enums_and_lambdas() {
        let plan = unit(vec![
            BindingEmission {
                decl: DeclId(4),
                handle: None,
                op: EmitOp::Function(FunctionEmission {
                    module: None,
                    name: "get_min_max".to_string(),
                    signature: None,
                    pointer: "&getMinMax".to_string(),
                    args: vec![
                        ArgSpec {
                            name: "input".to_string(),
                            kind: ArgKind::Buffer,
                            default: None,
                        },
                        ArgSpec {
                            name: "size".to_string(),
                            kind: ArgKind::Arg,
                            default: Some("static_cast<int>(10)".to_string()),
                        },
                    ],
                    return_buffer: true,
                }),
            },
            BindingEmission {
                decl: DeclId(5),
                handle: Some("rb_cColor".to_string()),
                op: EmitOp::Enum(EnumEmission {
                    cpp: "Color".to_string(),
                    name: "Color".to_string(),
                    parent: None,
                    values: vec![("Red".to_string(), "Color::Red".to_string())],
                }),
            },
            BindingEmission {
                decl: DeclId(6),
                handle: None,
                op: EmitOp::Wrappers {
                    target: "Data_Type<Tests::Point>()".to_string(),
                    members: vec![Member::Lambda(Lambda {
                        name: "+".to_string(),
                        params: "const Tests::Point& self, const Tests::Point& other".to_string(),
                        ret: Some("Tests::Point".to_string()),
                        body: vec!["return self + other;".to_string()],
                    })],
                },
            },
        ]);
        let cpp = render_unit(&plan).cpp;
        assert!(cpp.contains(
            "  define_global_function(\"get_min_max\", &getMinMax,\n    ArgBuffer(\"input\"), Arg(\"size\") = static_cast<int>(10), ReturnBuffer());"
        ));
        assert!(cpp.contains("  rb_cColor = define_enum<Color>(\"Color\").\n    define_value(\"Red\", Color::Red);"));
        assert!(cpp.contains(
            "  Data_Type<Tests::Point>().\n    define_method(\"+\", [](const Tests::Point& self, const Tests::Point& other) -> Tests::Point\n    {\n      return self + other;\n    });"
        ));
    }

    #[test]
    fn test_aggregate_calls_units_in_order() {
        let mut a = unit(Vec::new());
        a.stem = "a".to_string();
        a.init = "Init_A".to_string();
        let mut b = unit(Vec::new());
        b.stem = "b".to_string();
        b.init = "Init_B".to_string();
        let text = render_aggregate("my_project", &[a, b]);
        assert_eq!(
            text,
            "#include \"a-rb.hpp\"\n#include \"b-rb.hpp\"\n\nextern \"C\"\nvoid Init_MyProject()\n{\n  Init_A();\n  Init_B();\n}\n"
        );
    }
}
