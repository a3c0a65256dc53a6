use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use sphinx_kconfig::{Kconfig, KconfigDatabase};
use std::fmt::Write as _;
use std::fs;
use tempfile::TempDir;

/// A tree with `menus` menus of `per_menu` symbols, each depending on and
/// selecting its neighbours.
fn write_tree(dir: &TempDir, menus: usize, per_menu: usize) -> std::path::PathBuf {
    let mut root = String::from("mainmenu \"Benchmark\"\n\n");
    for m in 0..menus {
        let _ = writeln!(root, "rsource \"menu{}/Kconfig\"", m);

        let mut menu = format!("menu \"Menu {}\"\n\n", m);
        for s in 0..per_menu {
            let _ = writeln!(menu, "config SYM_{}_{}", m, s);
            let _ = writeln!(menu, "\tbool \"Symbol {} {}\"", m, s);
            if s > 0 {
                let _ = writeln!(menu, "\tdepends on SYM_{}_{} || SYM_{}_0", m, s - 1, m);
            }
            if s + 1 < per_menu {
                let _ = writeln!(menu, "\tselect SYM_{}_{} if SYM_{}_0", m, s + 1, m);
            }
            let _ = writeln!(menu, "\tdefault y\n\thelp\n\t  Help for symbol {} {}.\n", m, s);
        }
        menu.push_str("endmenu\n");

        let menu_dir = dir.path().join(format!("menu{}", m));
        fs::create_dir_all(&menu_dir).unwrap();
        fs::write(menu_dir.join("Kconfig"), menu).unwrap();
    }

    let path = dir.path().join("Kconfig");
    fs::write(&path, root).unwrap();
    path
}

fn bench_load(c: &mut Criterion) {
    let mut group = c.benchmark_group("kconfig_load");
    for size in [10, 50] {
        let dir = TempDir::new().unwrap();
        let root = write_tree(&dir, size, 20);
        group.bench_with_input(BenchmarkId::from_parameter(size * 20), &root, |b, root| {
            b.iter(|| Kconfig::load(black_box(root)).unwrap())
        });
    }
    group.finish();
}

fn bench_build_database(c: &mut Criterion) {
    let mut group = c.benchmark_group("database_build");
    for size in [10, 50] {
        let dir = TempDir::new().unwrap();
        let root = write_tree(&dir, size, 20);
        let kconfig = Kconfig::load(&root).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(size * 20), &kconfig, |b, kconfig| {
            b.iter(|| KconfigDatabase::build(black_box(kconfig)))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_load, bench_build_database);
criterion_main!(benches);
